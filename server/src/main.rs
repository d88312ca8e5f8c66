use anyhow::Result;
use clap::Parser;
use gigpal_server::{api, config};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = config::Cli::parse();
    let cfg = config::Config::load(&cli)?;
    let level = if cfg.logging_enabled { "info" } else { "warn" };
    // RUST_LOG wins over the config toggle
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    info!(config = ?cfg, "starting gigpal");
    api::run_http_server(cfg).await
}
