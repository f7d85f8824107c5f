// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "warescan")]
#[command(about = "Barcode and QR capture engine for warehouse tooling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available cameras
    List {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan codes from a camera
    Scan {
        /// Device id to use (from 'warescan list'); default picks the
        /// rear-facing camera when one is identifiable
        #[arg(short, long)]
        device: Option<String>,

        /// Decode strategy
        #[arg(short, long, default_value = "continuous")]
        strategy: cli::StrategyArg,

        /// Keep scanning after the first match
        #[arg(short, long)]
        continuous: bool,

        /// Give up after this many seconds (0 = no limit)
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Validate a code without a camera
    Check {
        /// The code to validate
        code: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set RUST_LOG to control log level, e.g. RUST_LOG=warescan=debug
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(true)
        .with_level(true)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::List { json } => cli::list_cameras(json),
        Commands::Scan {
            device,
            strategy,
            continuous,
            timeout,
        } => cli::scan(device, strategy, continuous, timeout).await,
        Commands::Check { code } => cli::check(&code),
    }
}
