use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{AuthCommand, ConfigCommand, FavCommand, ItemCommand, ProfileCommand, Remote};
use sportswap::config::Config;
use sportswap::db::{init_db, FavoritesStore};

#[derive(Parser)]
#[command(name = "sportswap")]
#[command(version)]
#[command(about = "Swap sports equipment with people nearby", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, register or sign out
    Auth(AuthCommand),

    /// Browse and list items
    Item(ItemCommand),

    /// Manage liked items
    Fav(FavCommand),

    /// View or edit your profile
    Profile(ProfileCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sportswap=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load(cli.config)?;

    match cli.command {
        Some(Commands::Auth(cmd)) => {
            let remote = Remote::open(&config).await?;
            cmd.run(&remote).await?;
        }
        Some(Commands::Item(cmd)) => {
            let remote = Remote::open(&config).await?;
            cmd.run(&remote).await?;
        }
        Some(Commands::Fav(cmd)) => {
            let pool = init_db(&config.database_path.value).await?;
            let store = Arc::new(FavoritesStore::open(pool).await?);
            let remote = Remote::open(&config).await?;
            cmd.run(store, &remote).await?;
        }
        Some(Commands::Profile(cmd)) => {
            let remote = Remote::open(&config).await?;
            cmd.run(&remote).await?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(&config)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
