//! DataBridge Server Binary
//!
//! Configuration is layered: defaults, then the optional config file, then
//! `DATABRIDGE_*` environment variables, then command-line flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use databridge_common::{BridgeConfig, LoggingConfig};
use databridge_server::BridgeServer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "databridge-server")]
#[command(author, version, about = "DataBridge - one API over relational and key-value stores", long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(short, long, env = "DATABRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to bind
    #[arg(short, long)]
    bind: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = BridgeConfig::load_or_default(cli.config.as_ref())
        .await
        .context("loading configuration")?;
    config.apply_env().context("reading DATABRIDGE_* environment")?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    config.validate()?;

    init_tracing(&config.logging);
    if let Some(path) = &cli.config {
        info!("Configuration loaded from {}", path.display());
    }

    BridgeServer::new(config)
        .run()
        .await
        .map_err(|e| anyhow::anyhow!(e))
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));
    let registry = tracing_subscriber::registry().with(filter);

    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }
}
