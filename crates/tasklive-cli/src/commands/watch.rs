//! Stream watcher command.
//!
//! Connects as the given user through the client SDK's reconnecting
//! controller and prints every application event. Useful for eyeballing
//! what a browser tab would receive.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use tasklive_client::{spawn, ClientConfig, ClientEvent, SseTransport};

#[derive(Args)]
pub struct WatchArgs {
    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:3030")]
    pub url: String,

    /// User identity to connect as
    #[arg(long)]
    pub user: String,
}

pub async fn execute(args: WatchArgs) -> Result<()> {
    let transport = SseTransport::new(&args.url, &args.user);
    let (_handle, mut events) = spawn(transport, ClientConfig::default());

    println!(
        "  {} {} {}",
        "Watching".cyan().bold(),
        args.url,
        format!("as {}", args.user).dimmed()
    );

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Event(event) => {
                println!("{} {}", event.kind.green(), serde_json::Value::Object(event.payload));
            }
            ClientEvent::Disconnected => {
                eprintln!("{}", "Disconnected; reconnect attempts exhausted".red());
                break;
            }
        }
    }

    Ok(())
}
