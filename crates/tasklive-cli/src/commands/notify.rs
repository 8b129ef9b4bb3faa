//! Manual notification command.
//!
//! Pushes a one-off event through a running server, the same way a
//! mutation handler would after committing a change.

use anyhow::{bail, Result};
use clap::Args;

use tasklive_core::event::Event;
use tasklive_core::notifier::ChangeNotifier;

#[derive(Args)]
pub struct NotifyArgs {
    /// Server base URL
    #[arg(long, default_value = "http://127.0.0.1:3030")]
    pub url: String,

    /// Event type tag
    #[arg(long = "type")]
    pub kind: String,

    /// Event payload as a JSON object
    #[arg(long, default_value = "{}")]
    pub payload: String,

    /// Deliver to one user's connections
    #[arg(long, conflicts_with_all = ["topic", "broadcast"])]
    pub user: Option<String>,

    /// Deliver to a topic's viewers
    #[arg(long, conflicts_with = "broadcast")]
    pub topic: Option<String>,

    /// Deliver to every connected client
    #[arg(long)]
    pub broadcast: bool,
}

pub async fn execute(args: NotifyArgs) -> Result<()> {
    let payload: serde_json::Value = serde_json::from_str(&args.payload)?;
    let event = Event::with_payload(&args.kind, payload);
    let notifier = ChangeNotifier::with_url(&args.url);

    if let Some(user) = &args.user {
        notifier.notify_user(user, event).await;
    } else if let Some(topic) = &args.topic {
        notifier.notify_topic(topic, event).await;
    } else if args.broadcast {
        notifier.notify_broadcast(event).await;
    } else {
        bail!("specify one of --user, --topic or --broadcast");
    }

    Ok(())
}
