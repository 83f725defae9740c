//! crossfeed HTTP service binary.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use crossfeed::{AccountStore, CrossfeedServer, ServiceConfig};
use crossfeed_search::{SearchEngine, UsageMeter};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// crossfeed: one query, every platform.
#[derive(Parser)]
#[command(name = "crossfeed", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("crossfeed=info,crossfeed_search=info")
        }))
        .init();

    let cli = Cli::parse();

    let mut config = ServiceConfig::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let accounts = Arc::new(AccountStore::new(config.accounts.clone()));
    let meter = UsageMeter::new(accounts.clone(), accounts.clone());
    let engine = Arc::new(SearchEngine::from_config(config.search.clone(), meter)?);
    info!(platforms = ?engine.available_platforms(), "search engine ready");

    let server = CrossfeedServer::start(engine, accounts, &config.server).await?;
    println!("crossfeed v{} on http://{}", env!("CARGO_PKG_VERSION"), server.addr());

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    server.shutdown();
    Ok(())
}
