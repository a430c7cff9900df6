//! routewatch - multi-vendor routing table collector.
//!
//! This is the main entry point for the routewatch CLI.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use routewatch::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging();

    if let Err(err) = cli::run(cli).await {
        tracing::error!(error = %err, "command failed");
        eprintln!("Error: {err}");
        std::process::exit(err.exit_code());
    }
}

/// RUST_LOG wins, then ROUTEWATCH_LOG_LEVEL; the default keeps
/// routewatch at info and dependencies at warn.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        match std::env::var("ROUTEWATCH_LOG_LEVEL") {
            Ok(level) => EnvFilter::new(format!("warn,routewatch={level}")),
            Err(_) => EnvFilter::new("warn,routewatch=info"),
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
