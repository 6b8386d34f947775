use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use super::{next_result, OutputFormat, Remote};
use sportswap::models::{parse_item_type, search, Condition, GeoPoint, Item, ItemResponse};
use sportswap::remote::IdentityProvider;
use sportswap::resource::settle;
use sportswap::service::ListingService;

#[derive(Args)]
pub struct ItemCommand {
    #[command(subcommand)]
    pub command: ItemSubcommand,
}

#[derive(Subcommand)]
pub enum ItemSubcommand {
    /// List items for swap
    List {
        /// Only items whose name, type or description contain this text
        #[arg(long, short)]
        search: Option<String>,

        /// Only items listed by the signed-in user
        #[arg(long)]
        mine: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show an item's details
    Show {
        /// Item ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// List a new item
    Add {
        /// Name of the item
        name: String,

        /// Description
        #[arg(long)]
        description: String,

        /// Category, e.g. "Water Sports"
        #[arg(long = "type", value_name = "TYPE")]
        item_type: String,

        /// Condition (new, used)
        #[arg(long)]
        condition: Condition,

        /// Asking price
        #[arg(long, default_value = "")]
        price: String,

        /// Pickup address
        #[arg(long, default_value = "")]
        address: String,

        /// Latitude of the pickup location
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude of the pickup location
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        lon: f64,

        /// Image file (can be repeated)
        #[arg(long = "image", value_name = "PATH")]
        images: Vec<PathBuf>,
    },
}

impl ItemCommand {
    pub async fn run(&self, remote: &Remote) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ItemSubcommand::List {
                search: query,
                mine,
                format,
            } => {
                let items = if *mine {
                    settle(remote.items.fetch_my_listed_items()).await?
                } else {
                    settle(remote.items.fetch_all_items()).await?
                };
                let matching: Vec<&ItemResponse> = match query {
                    Some(query) => search(&items, query),
                    None => items.iter().collect(),
                };
                print_items(&matching, format)
            }

            ItemSubcommand::Show { id, format } => {
                let item = settle(remote.items.fetch_item_by_id(id)).await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&item)?);
                    }
                    OutputFormat::Text => {
                        println!("{}", item);
                    }
                }
                Ok(())
            }

            ItemSubcommand::Add {
                name,
                description,
                item_type,
                condition,
                price,
                address,
                lat,
                lon,
                images,
            } => {
                let item_type = parse_item_type(item_type)?;

                let mut bytes = Vec::with_capacity(images.len());
                for path in images {
                    let data = tokio::fs::read(path)
                        .await
                        .map_err(|e| format!("Failed to read image '{}': {}", path.display(), e))?;
                    bytes.push(data);
                }

                let draft = Item::new(name.trim())
                    .with_description(description.trim())
                    .with_type(item_type)
                    .with_condition(condition.as_str())
                    .with_price(price.trim())
                    .with_location(GeoPoint::new(*lat, *lon), address.trim())
                    .with_images(bytes);
                draft.validate()?;

                let identity: Arc<dyn IdentityProvider> = remote.backend.clone();
                let listing = ListingService::new(remote.items.clone(), identity);
                let mut states = listing.subscribe();
                listing.update_draft(draft);
                listing.submit();

                let id = next_result(&mut states).await;
                remote.items.flush().await;
                println!("Listed item with ID: {}", id?);
                Ok(())
            }
        }
    }
}

pub(super) fn print_items(
    items: &[&ItemResponse],
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No items found");
        return Ok(());
    }

    println!("{:<20}  {:<30}  {:<22}  PRICE", "ID", "NAME", "TYPE");
    println!("{}", "-".repeat(84));
    for item in items {
        println!(
            "{:<20}  {:<30}  {:<22}  {}",
            item.id,
            truncate(&item.name, 30),
            truncate(&item.item_type, 22),
            item.price
        );
    }
    println!("\nTotal: {} item(s)", items.len());
    Ok(())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let kept: String = text.chars().take(width - 3).collect();
        format!("{}...", kept)
    } else {
        text.to_string()
    }
}
