//! CineGuess Game Server
//!
//! Serves the movie-frame guessing game over WebSocket.

use std::sync::Arc;
use anyhow::Context;
use tracing::{info, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cineguess::{
    VERSION,
    catalog::Catalog,
    game::engine::RoundConfig,
    network::server::{GameServer, ServerConfig},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let default_level = if cfg!(feature = "debug-tracing") { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("CineGuess Server v{}", VERSION);

    let config = ServerConfig::from_env();
    let catalog = match &config.catalog_path {
        Some(path) => Catalog::load(path)
            .with_context(|| format!("Failed to load catalog from {}", path.display()))?,
        None => Catalog::builtin().context("Bundled catalog is invalid")?,
    };
    info!("Catalog: {} movies, genres {:?}", catalog.len(), catalog.genres());

    let round_config = RoundConfig::default();
    info!("Round: {}s limit, {:?} tick", round_config.round_seconds, round_config.tick_interval);

    let server = Arc::new(GameServer::new(config, Arc::new(catalog), round_config));

    let signal_server = server.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, shutting down");
                signal_server.shutdown();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    server.run().await?;

    // Give connection tasks a moment to send their shutdown notices
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    info!("Server stopped");
    Ok(())
}
