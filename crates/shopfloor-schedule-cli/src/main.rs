use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_logging();
    let cli = shopfloor_schedule_cli::Cli::parse();
    shopfloor_schedule_cli::run_cli(cli)
}

/// Logs go to stderr so stdout stays parseable JSON.
fn init_logging() {
    let filter = EnvFilter::try_from_env("SHOPFLOOR_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
