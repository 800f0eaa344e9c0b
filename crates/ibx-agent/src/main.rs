//! ibx-agent entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Trade intent execution engine for a brokerage gateway.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via IBX_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    ibx_gateway::init_crypto();

    let args = Args::parse();

    ibx_telemetry::init_logging()?;

    info!("Starting ibx-agent v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > IBX_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("IBX_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = ibx_agent::AppConfig::load(&config_path)?;
    info!(
        url = %config.gateway.url(),
        client_id = config.gateway.client_id,
        "Configuration loaded"
    );

    let app = ibx_agent::Application::new(config);
    app.run().await?;

    Ok(())
}
