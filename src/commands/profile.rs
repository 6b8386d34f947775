use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::{next_result, OutputFormat, Remote};
use sportswap::models::UserData;
use sportswap::service::ProfileService;

#[derive(Args)]
pub struct ProfileCommand {
    #[command(subcommand)]
    pub command: ProfileSubcommand,
}

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// Show the signed-in user's profile
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Update name and address, optionally with a new profile image
    Update {
        /// Display name
        #[arg(long)]
        name: String,

        /// Address
        #[arg(long)]
        address: String,

        /// Profile image file
        #[arg(long)]
        image: Option<PathBuf>,
    },
}

impl ProfileCommand {
    pub async fn run(&self, remote: &Remote) -> Result<(), Box<dyn std::error::Error>> {
        let profiles = ProfileService::new(remote.profiles.clone());
        match &self.command {
            ProfileSubcommand::Show { format } => {
                let mut states = profiles.subscribe_profile();
                profiles.fetch_profile();
                let profile = next_result(&mut states).await?;

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&profile)?);
                    }
                    OutputFormat::Text => {
                        print!("{}", profile);
                    }
                }
                Ok(())
            }

            ProfileSubcommand::Update {
                name,
                address,
                image,
            } => {
                if name.trim().is_empty() {
                    return Err("Name cannot be empty".into());
                }
                let mut draft = UserData::new(name.trim(), address.trim());
                if let Some(path) = image {
                    let bytes = tokio::fs::read(path)
                        .await
                        .map_err(|e| format!("Failed to read image '{}': {}", path.display(), e))?;
                    draft = draft.with_image(bytes);
                }

                let mut states = profiles.subscribe_updates();
                profiles.update_profile(draft);
                let message = next_result(&mut states).await?;
                println!("{}", message);
                Ok(())
            }
        }
    }
}
