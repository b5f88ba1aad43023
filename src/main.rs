//! Tollgate - LLM chat-completion gateway
//!
//! CLI entry point. Storage is embedded SQLite; no external services are
//! required beyond the upstream provider.

#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tollgate::{server, AppConfig, SqliteStore};
use tracing_subscriber::EnvFilter;

/// Tollgate LLM gateway CLI
#[derive(Parser, Debug)]
#[command(name = "tollgate")]
#[command(about = "LLM chat-completion gateway with fallback and cost accounting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway (default)
    Serve,
    /// Create or update the database schema, then exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tollgate=info,tower_http=warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let config = AppConfig::from_env().context("Failed to load configuration")?;
            server::run(config).await
        }
        Commands::Migrate => {
            let config = AppConfig::from_env().context("Failed to load configuration")?;
            let store = SqliteStore::from_path(&config.db_path).await?;
            store.seed_pricing(&config.routing).await?;
            tracing::info!("Migrations applied");
            Ok(())
        }
    }
}
