use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shadow::beacon::{Beacon, HitStore};
use shadow::config::Config;
use shadow::server;

/// Minimal HTTP/1.1 server running the tracking beacon.
#[derive(Debug, Parser)]
#[command(name = "shadow", version, about)]
struct Cli {
    /// YAML config file; HOST, PORT, READ_TIMEOUT and HIT_LOG still override it
    #[arg(short, long, env = "SHADOW_CONFIG")]
    config: Option<PathBuf>,

    /// Domains whose page views are recorded
    domains: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    let mut cfg = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    cfg.beacon.domains.extend(cli.domains);

    let store = match &cfg.beacon.store_path {
        Some(path) => HitStore::open(path).await?,
        None => HitStore::in_memory(),
    };

    tracing::info!(domains = ?cfg.beacon.domains, "Tracking domains");
    let beacon = Arc::new(Beacon::new(&cfg.beacon.domains, store));

    tokio::select! {
        res = server::listener::run(&cfg.server, beacon) => {
            res?;
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
