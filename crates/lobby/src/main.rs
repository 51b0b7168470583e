//! Lobby relay server
//!
//! Usage: `lobby [config.toml]`. Environment variables override the file;
//! `RUST_LOG` controls log output (default `info`).

use std::env;
use std::path::PathBuf;

use anyhow::Context;
use lobby::LobbyConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = env::args().nth(1).map(PathBuf::from);
    let config = LobbyConfig::load(path.as_deref()).context("failed to load configuration")?;

    lobby::server::run(config).await
}
