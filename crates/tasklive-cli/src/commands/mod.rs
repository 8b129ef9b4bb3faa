//! CLI command definitions and handlers.

use clap::{Parser, Subcommand};

pub mod notify;
pub mod serve;
pub mod watch;

/// Tasklive - realtime notifications for the collaborative task board
#[derive(Parser)]
#[command(name = "tasklive")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the realtime web server
    Serve(serve::ServeArgs),

    /// Follow a user's event stream and print incoming events
    Watch(watch::WatchArgs),

    /// Send an event through a running server
    Notify(notify::NotifyArgs),
}
