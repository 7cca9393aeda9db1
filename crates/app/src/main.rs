//! Lounge Hub - liveness and membership tracker for lounge bots
//!
//! Opens the shared store, sweeps it on a fixed interval and closes it on
//! Ctrl-C. Chat dispatch runs elsewhere against the same `Database` handle.

use lounge_core::Database;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod sweeper;

use config::HubConfig;
use sweeper::Sweeper;

#[tokio::main]
async fn main() {
    let config = match HubConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("LOUNGE HUB: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    tracing::info!("Starting Lounge Hub");

    let db_path = match config.database_path() {
        Ok(path) => path,
        Err(e) => {
            tracing::error!("Failed to resolve database path: {}", e);
            std::process::exit(1);
        }
    };

    // Schema failures are unrecoverable
    let db = match Database::open_with(&db_path, config.store_options()).await {
        Ok(db) => db,
        Err(e) => {
            tracing::error!(path = %db_path.display(), "Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    match db.lounges().active().await {
        Ok(lounges) => tracing::info!(active_lounges = lounges.len(), "Store ready"),
        Err(e) => tracing::warn!("Could not list active lounges: {}", e),
    }

    let sweeper = Sweeper::spawn(db.clone(), config.sweep_interval());

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }

    tracing::info!(sweeps = sweeper.completed(), "Shutting down");
    sweeper.shutdown().await;
    if let Err(e) = db.close().await {
        tracing::error!("Failed to close database: {}", e);
    }
}
