use std::time::Duration;

use anyhow::{Context, Result};
use bsky_post_lib::agent::PUBLIC_API;
use bsky_post_lib::{fetch_author_feed, AgentConfig, XrpcAgent};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bsky-feed")]
#[command(about = "Print an account's recent Bluesky posts and threads as JSON")]
struct Args {
    /// Handle or DID (e.g., user.bsky.social)
    actor: String,

    /// Number of posts to fetch (1-100)
    #[arg(short, long, default_value_t = 20)]
    limit: u8,

    /// AppView to read from
    #[arg(long, env = "BSKY_APPVIEW", default_value = PUBLIC_API)]
    appview: String,

    /// HTTP timeout, in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.with_target(false).json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.json_logs);

    let config = AgentConfig {
        service: args.appview,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let agent = XrpcAgent::public(&config)?;

    let output = fetch_author_feed(&agent, &args.actor, args.limit)
        .await
        .with_context(|| format!("Failed to fetch feed for {}", args.actor))?;

    info!("Fetched {} posts by {}", output.posts.len(), output.author.handle);
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
