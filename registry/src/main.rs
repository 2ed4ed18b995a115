//! `botnet-registry` entry point.
//!
//! Hosts the registry and its keep-alive sweeper for the lifetime of the
//! process. Connection handlers embed the library and share the same
//! `BotManager`; this binary runs it standalone.
//!
//! Usage: `botnet-registry [CONFIG_PATH]`. Without a path the config is looked
//! up in the default locations; `BOTNET_*` variables override either way.

use std::sync::Arc;

use botnet_registry::config::ConfigLoader;
use botnet_registry::manager::BotManager;
use botnet_registry::sweep::spawn_sweeper;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("botnet-registry v{} starting", env!("CARGO_PKG_VERSION"));

    let loaded = match std::env::args().nth(1) {
        Some(path) => ConfigLoader::new().with_file(path).load(),
        None => ConfigLoader::load_default(),
    };
    let config = loaded.map_err(|e| std::io::Error::other(format!("Failed to load config: {e}")))?;
    tracing::info!(
        "Sweep every {}s, {}-byte nonces, store tracing {}",
        config.sweep.interval_secs,
        config.sweep.nonce_bytes,
        if config.store.trace_queries { "on" } else { "off" }
    );

    let manager = Arc::new(BotManager::new(&config));
    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(
        Arc::clone(&manager),
        config.sweep.interval(),
        shutdown.clone(),
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!(
        "Signal received, shutting down ({} bots registered)",
        manager.bot_count()
    );
    shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("Sweeper task ended abnormally: {e}");
    }

    tracing::info!("botnet-registry exiting cleanly");
    Ok(())
}
