//! CLI entry point: mode selection, env loading, logging, and the runner.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cross_arb::config::{Config, Credentials, Mode};
use cross_arb::runner;

/// Cross-venue arbitrage scanner for binary prediction markets.
#[derive(Debug, Parser)]
#[command(name = "cross-arb", version)]
struct Cli {
    /// Simulated execution against virtual wallets (no orders placed).
    #[arg(long, conflicts_with = "live")]
    paper: bool,

    /// Real execution on both venues (requires credentials).
    #[arg(long, conflicts_with = "paper")]
    live: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cross_arb=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let mode = if cli.live {
        Mode::Live
    } else if cli.paper {
        Mode::Paper
    } else {
        Mode::Scan
    };

    let cfg = Config::from_env();
    let credentials = Credentials::from_env();
    if credentials.is_none() && mode == Mode::Scan {
        info!("credentials not set - scan-only regardless of market conditions");
    }
    runner::validate_mode(mode, &credentials)?;

    runner::run(cfg, mode, credentials).await
}
