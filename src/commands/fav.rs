use clap::{Args, Subcommand};
use std::sync::Arc;

use super::item::print_items;
use super::{next_result, OutputFormat, Remote};
use sportswap::db::FavoritesStore;
use sportswap::models::ItemResponse;
use sportswap::resource::settle;
use sportswap::service::FavoritesService;
use sportswap::SwapError;

#[derive(Args)]
pub struct FavCommand {
    #[command(subcommand)]
    pub command: FavSubcommand,
}

#[derive(Subcommand)]
pub enum FavSubcommand {
    /// List liked items
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Like an item
    Add {
        /// Item ID
        id: String,
    },

    /// Unlike an item
    Remove {
        /// Item ID
        id: String,
    },
}

impl FavCommand {
    pub async fn run(
        &self,
        store: Arc<FavoritesStore>,
        remote: &Remote,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let favorites = FavoritesService::new(Arc::clone(&store), remote.items.clone());
        match &self.command {
            FavSubcommand::List { format } => {
                let mut states = favorites.subscribe();
                favorites.activate();
                let items = next_result(&mut states).await;
                favorites.deactivate();

                let items = items?;
                let hidden = favorites.liked_ids().len().saturating_sub(items.len());
                let refs: Vec<&ItemResponse> = items.iter().collect();
                print_items(&refs, format)?;
                if hidden > 0 {
                    if let OutputFormat::Text = format {
                        println!("({} liked item(s) no longer available)", hidden);
                    }
                }
                Ok(())
            }

            FavSubcommand::Add { id } => {
                if id.trim().is_empty() {
                    return Err("Item ID cannot be empty".into());
                }
                let id = id.trim();
                if favorites.is_liked(id).await? {
                    println!("Item {} is already liked", id);
                    return Ok(());
                }
                favorites.like_item(id).await?;
                println!("Liked item {}", id);
                Ok(())
            }

            FavSubcommand::Remove { id } => {
                let removed = match settle(remote.items.fetch_item_by_id(id)).await {
                    Ok(item) => favorites.unlike_item(&item).await?,
                    // Listing is gone; drop the stale id directly.
                    Err(SwapError::NotFound(_)) => store.remove(id).await?,
                    Err(e) => return Err(e.into()),
                };
                if removed {
                    println!("Unliked item {}", id);
                } else {
                    println!("Item {} was not liked", id);
                }
                Ok(())
            }
        }
    }
}
