//! watchsyncd - standalone watch-party hub
//!
//! Loads a TOML config (movie catalog + listen port), starts the hub, and
//! runs until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use watchsync_core::InMemoryCatalog;
use watchsync_net::Hub;

mod config;

use config::ServerConfig;

fn config_path() -> Option<PathBuf> {
    if let Some(arg) = std::env::args().nth(1) {
        return Some(PathBuf::from(arg));
    }
    std::env::var_os("WATCHSYNC_CONFIG").map(PathBuf::from)
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting watchsyncd");

    let config = match config_path() {
        Some(path) => match ServerConfig::load(&path) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "Loaded config");
                config
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Failed to load config");
                std::process::exit(1);
            }
        },
        None => {
            tracing::info!("No config given, using defaults");
            ServerConfig::default()
        }
    };

    let catalog = Arc::new(InMemoryCatalog::new());
    for entry in config.movies {
        catalog.register(entry.into_movie());
    }
    tracing::info!(movies = catalog.len(), "Catalog ready");

    let hub = match Hub::start(config.port, catalog).await {
        Ok(hub) => hub,
        Err(e) => {
            tracing::error!(error = %e, "Failed to start hub");
            std::process::exit(1);
        }
    };
    tracing::info!(addr = %hub.addr(), "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }

    tracing::info!("Shutting down");
    hub.shutdown();
}
