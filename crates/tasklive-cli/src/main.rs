//! Tasklive CLI
//!
//! Realtime change notifications for the collaborative task board.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

/// Initialize tracing from `RUST_LOG`, with sane defaults otherwise.
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "tasklive=debug,tasklive_core=debug,tasklive_web=debug,tasklive_client=debug"
    } else {
        "tasklive=info,tasklive_core=info,tasklive_web=info,tasklive_client=info"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Serve(args) => commands::serve::execute(args).await,
        Commands::Watch(args) => commands::watch::execute(args).await,
        Commands::Notify(args) => commands::notify::execute(args).await,
    }
}
