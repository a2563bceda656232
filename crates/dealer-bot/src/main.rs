//! Dealer hedging adapter - Entry Point

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Taker-venue adapter for the maker/taker dealer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via DEALER_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Start with the run switch off
    #[arg(long)]
    paused: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    dealer_ws::init_crypto();

    let args = Args::parse();

    dealer_telemetry::init_logging()?;

    info!("Starting dealer-bot v{}", env!("CARGO_PKG_VERSION"));

    // Config path: CLI arg > DEALER_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("DEALER_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");
    let config = dealer_bot::AppConfig::from_file(&config_path)?;
    info!(
        product = %config.venue.product,
        testnet = config.venue.testnet,
        ws_url = %config.venue.ws_url(),
        leverage = ?config.venue.leverage(),
        max_collateral_deviation = %config.venue.max_collateral_deviation,
        max_offer_volume = %config.hedger.max_offer_volume,
        "Configuration loaded"
    );
    if config.venue.credentials().is_none() {
        warn!("No API credentials configured; private tables and orders are unavailable");
    }

    let shutdown = CancellationToken::new();
    let (switch_tx, switch_rx) = watch::channel(config.supervisor.start_enabled && !args.paused);
    let status_interval = config.supervisor.status_interval();

    let supervisor = dealer_bot::Supervisor::new(config, switch_rx, shutdown.clone());
    let handle = supervisor.handle();
    let supervisor_task = tokio::spawn(supervisor.run());

    let mut status_ticker = tokio::time::interval(status_interval);
    loop {
        tokio::select! {
            _ = status_ticker.tick() => {
                info!(status = %handle.status_summary(), "Adapter status");
                if let Some(adapter) = handle.current() {
                    if adapter.is_ready() {
                        info!("\n{}{}", adapter.positions_report(), adapter.balance_report());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    let _ = switch_tx.send(false);
    shutdown.cancel();
    supervisor_task.await??;

    info!("Shutdown complete");
    Ok(())
}
