use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use bsky_post_lib::agent::DEFAULT_SERVICE;
use bsky_post_lib::{
    load_batch, post_url_from_uri, prepare, process_batch, Action, AgentConfig, RecordCompiler,
    Request, XrpcAgent, DEFAULT_ENV_PREFIX,
};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bsky-post")]
#[command(about = "Post, repost, quote-post or reply on Bluesky from a JSON request file")]
struct Args {
    /// Request file, usually <base>/new/<name>.json
    file: PathBuf,

    /// Validate, log in and resolve references, then print the compiled requests without posting
    #[arg(long)]
    check: bool,

    /// PDS to log in to
    #[arg(long, env = "BSKY_SERVICE", default_value = DEFAULT_SERVICE)]
    service: String,

    /// Prefix of the <PREFIX>_IDENTIFIER_<account> and <PREFIX>_APP_PASSWORD_<account> variables
    #[arg(long, env = "BSKY_ENV_PREFIX", default_value = DEFAULT_ENV_PREFIX)]
    env_prefix: String,

    /// HTTP timeout for every request, in seconds
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

/// Public web URL of what a request acted on: the new post, or for a repost
/// the post that was reposted.
async fn public_url(agent: &XrpcAgent, request: &Request) -> Option<String> {
    let uri = match request.action {
        Action::Repost => &request.repost_info.as_ref()?.uri,
        _ => &request.result.as_ref()?.uri,
    };

    match post_url_from_uri(agent, uri).await {
        Ok(url) => Some(url),
        Err(e) => {
            warn!("Could not build a public URL for {}: {}", uri, e);
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let env: HashMap<String, String> = std::env::vars().collect();
    let batch = load_batch(&args.file, &args.env_prefix, &env)
        .await
        .with_context(|| format!("Rejected request file {}", args.file.display()))?;

    let config = AgentConfig {
        service: args.service.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let agent = XrpcAgent::login(&config, &batch.credentials)
        .await
        .with_context(|| format!("Failed to log in as {}", batch.credentials.identifier))?;

    if args.check {
        let mut requests = batch.requests;
        prepare(RecordCompiler::new(&agent, agent.http()), &mut requests)
            .await
            .context("Failed to resolve request")?;
        println!("{}", serde_json::to_string_pretty(&requests)?);
        return Ok(());
    }

    let source = batch.source.clone();
    let processed = process_batch(&agent, agent.http(), batch)
        .await
        .with_context(|| format!("Failed to process {}", source.display()))?;

    println!(
        "Processed and moved file: {} -> {}",
        source.display(),
        processed.archived.display()
    );
    for request in &processed.requests {
        if let Some(url) = public_url(&agent, request).await {
            println!("{}", url);
        }
    }
    info!("Done, {} post(s) created", processed.results.len());

    Ok(())
}
