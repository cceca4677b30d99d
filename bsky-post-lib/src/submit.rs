//! Sending compiled requests to the API, one after another.

use futures::future::try_join_all;
use tracing::info;

use crate::compiler::RecordCompiler;
use crate::error::{Error, Result};
use crate::record::PostRef;
use crate::request::{Action, Request};
use crate::thread::advance_thread;

/// Resolve references and build records for every request without uploading
/// anything. Requests don't depend on each other at this stage, so this runs
/// concurrently.
pub async fn prepare(compiler: RecordCompiler<'_>, requests: &mut [Request]) -> Result<()> {
    try_join_all(
        requests
            .iter_mut()
            .map(|request| async move { compiler.compile(request, false).await }),
    )
    .await?;
    Ok(())
}

/// Submit each request in order and return the created references.
///
/// Within-thread replies are pointed at the previous result before they are
/// sent; the first result becomes the thread root. The first failure stops
/// the run and posts already created stay up.
pub async fn submit(compiler: RecordCompiler<'_>, requests: &mut [Request]) -> Result<Vec<PostRef>> {
    let total = requests.len();
    let mut results = Vec::with_capacity(total);
    let mut previous: Option<PostRef> = None;
    let mut root: Option<PostRef> = None;

    for (i, request) in requests.iter_mut().enumerate() {
        if request.is_within_thread_reply() {
            match (&previous, &root) {
                (Some(previous), Some(root)) => advance_thread(request, previous, root),
                _ => {
                    return Err(Error::Precondition(format!(
                        "post {} of {} replies within the thread but no earlier post was submitted",
                        i + 1,
                        total
                    )))
                }
            }
        }

        let result = match request.action {
            Action::Post | Action::QuotePost | Action::Reply => {
                info!("Posting {}/{} ({})", i + 1, total, request.action);
                compiler.compile(request, true).await?;
                let record = request.record.as_ref().ok_or_else(|| {
                    Error::Precondition(format!("{} request compiled without a record", request.action))
                })?;
                compiler.agent().create_post(record).await?
            }
            Action::Repost => {
                let subject = request.repost_info.as_ref().ok_or_else(|| {
                    Error::Precondition("repost submitted before its reference was resolved".to_string())
                })?;
                info!("Reposting {}", subject.uri);
                compiler.agent().create_repost(subject).await?
            }
            Action::Unknown(_) | Action::Missing => {
                return Err(Error::Precondition(format!(
                    "unvalidated action {:?} reached submission",
                    request.action
                )))
            }
        };

        info!("Created {}", result.uri);
        request.result = Some(result.clone());
        root.get_or_insert_with(|| result.clone());
        previous = Some(result.clone());
        results.push(result);
    }

    Ok(results)
}
