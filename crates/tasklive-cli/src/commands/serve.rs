//! Web server command.

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use tasklive_core::config::RealtimeConfig;

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(long, default_value = "3030")]
    pub port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let config = RealtimeConfig::from_env()?;

    println!();
    println!("  {} {}", "Tasklive".cyan().bold(), "Realtime Server".bold());
    println!();
    println!(
        "  {}     http://{}:{}/api/stream",
        "Stream".green(),
        args.host,
        args.port
    );
    println!(
        "  {}     http://{}:{}/api/topics/{{topic}}/viewers",
        "Topics".green(),
        args.host,
        args.port
    );
    if config.expose_diagnostics {
        println!(
            "  {}       http://{}:{}/internal/diag",
            "Diag".green(),
            args.host,
            args.port
        );
    }
    println!();
    println!("  {}", "Ctrl+C to stop".dimmed());
    println!();

    tasklive_web::run_server(config, &args.host, args.port).await?;

    Ok(())
}
