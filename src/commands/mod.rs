mod auth;
mod config_cmd;
mod fav;
mod item;
mod profile;

pub use auth::AuthCommand;
pub use config_cmd::ConfigCommand;
pub use fav::FavCommand;
pub use item::ItemCommand;
pub use profile::ProfileCommand;

use clap::ValueEnum;
use std::sync::Arc;
use tokio::sync::broadcast;

use sportswap::config::Config;
use sportswap::remote::{EmulatorBackend, RemoteError};
use sportswap::repository::{AuthGateway, ItemRepository, ProfileRepository};
use sportswap::{Resource, SwapError};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Repositories wired to the emulated remote services.
pub struct Remote {
    pub backend: Arc<EmulatorBackend>,
    pub items: ItemRepository,
    pub auth: AuthGateway,
    pub profiles: ProfileRepository,
}

impl Remote {
    pub async fn open(config: &Config) -> Result<Self, RemoteError> {
        let backend = Arc::new(EmulatorBackend::open(&config.emulator_dir.value).await?);
        Ok(Self {
            items: ItemRepository::new(backend.clone(), backend.clone(), backend.clone()),
            auth: AuthGateway::new(backend.clone(), backend.clone()),
            profiles: ProfileRepository::new(backend.clone(), backend.clone(), backend.clone()),
            backend,
        })
    }
}

/// Waits for the next terminal state published on `receiver`.
pub async fn next_result<T: Clone>(
    receiver: &mut broadcast::Receiver<Resource<T>>,
) -> Result<T, SwapError> {
    loop {
        match receiver.recv().await {
            Ok(Resource::Loading) => tracing::debug!("Loading"),
            Ok(Resource::Success(data)) => return Ok(data),
            Ok(Resource::Error(e)) => return Err(e),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!("Skipped {} stale states", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => {
                return Err(SwapError::Local("service stopped".to_string()));
            }
        }
    }
}
