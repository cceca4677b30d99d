//! End-to-end handling of one request file: load, split, validate, prepare,
//! submit, archive.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{error, info};

use crate::agent::{Agent, Credentials, Fetch};
use crate::archive::archive;
use crate::compiler::RecordCompiler;
use crate::error::{Error, Result};
use crate::record::PostRef;
use crate::request::{Request, REPLY_IN_THREAD};
use crate::submit::{prepare, submit};
use crate::thread::split_request;
use crate::validator::{validate_account, validate_request};

/// A request file that passed validation and is ready to be sent.
#[derive(Debug)]
pub struct Batch {
    pub requests: Vec<Request>,
    pub credentials: Credentials,
    pub source: PathBuf,
    pub rich_text_file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct Processed {
    pub requests: Vec<Request>,
    pub results: Vec<PostRef>,
    pub archived: PathBuf,
}

/// Read a request file. A `richTextFile`, which must be relative to the
/// request file, replaces `richText` with its contents.
pub async fn load_request(path: &Path) -> Result<(Request, Option<PathBuf>)> {
    let source = std::path::absolute(path)?;
    let content = fs::read_to_string(&source).await?;
    let mut request: Request = serde_json::from_str(&content)?;

    let Some(relative) = request.rich_text_file.clone() else {
        return Ok((request, None));
    };
    if Path::new(&relative).is_absolute() {
        return Err(Error::Validation(format!(
            r#""richTextFile" must be a relative path, got {}"#,
            relative
        )));
    }

    let text_path = source.parent().unwrap_or(Path::new(".")).join(&relative);
    let text = fs::read_to_string(&text_path).await.map_err(|e| {
        Error::Validation(format!("cannot read richTextFile {}: {}", text_path.display(), e))
    })?;
    request.rich_text = Some(text);

    Ok((request, Some(text_path)))
}

/// Load and validate a request file without touching the network.
pub async fn load_batch(path: &Path, env_prefix: &str, env: &HashMap<String, String>) -> Result<Batch> {
    let (request, rich_text_file) = load_request(path).await?;

    let credentials = validate_account(&request, env_prefix, env)?;
    if request.is_within_thread_reply() {
        return Err(Error::Validation(format!(
            r#""replyURL" {} is only valid inside a split thread"#,
            REPLY_IN_THREAD
        )));
    }
    let requests = split_request(request);
    for request in &requests {
        validate_request(request)?;
    }

    info!(
        "Loaded {} ({} post{})",
        path.display(),
        requests.len(),
        if requests.len() == 1 { "" } else { "s" }
    );

    Ok(Batch {
        requests,
        credentials,
        source: std::path::absolute(path)?,
        rich_text_file,
    })
}

/// Resolve, submit and archive a validated batch.
pub async fn process_batch(agent: &dyn Agent, fetch: &dyn Fetch, batch: Batch) -> Result<Processed> {
    let Batch {
        mut requests,
        source,
        rich_text_file,
        ..
    } = batch;

    let compiler = RecordCompiler::new(agent, fetch);
    prepare(compiler, &mut requests).await?;
    let results = submit(compiler, &mut requests).await?;

    let archived = archive(&requests, &source, rich_text_file.as_deref())
        .await
        .inspect_err(|e| {
            let uris: Vec<&str> = results.iter().map(|r| r.uri.as_str()).collect();
            error!(
                "Posted {:?} but could not archive {}: {}",
                uris,
                source.display(),
                e
            );
        })?;

    info!("Processed and moved file: {} -> {}", source.display(), archived.display());
    Ok(Processed {
        requests,
        results,
        archived,
    })
}
