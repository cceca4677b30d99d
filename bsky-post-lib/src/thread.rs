//! Splitting one authored text into a reply chain, and wiring each reply to
//! the post submitted before it.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::compiler::attach_reply;
use crate::record::PostRef;
use crate::request::{Action, ReplyTarget, Request};

// A line of three or more -, * or _ (optionally spaced), like a markdown
// thematic break
static THEMATIC_BREAK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:[-*_][ \t]*){3,}\r?$").expect("thematic break regex")
});

/// Split a request whose rich text contains thematic breaks into a thread.
///
/// The first element keeps the original action; every later element becomes
/// a reply to the previous post of the thread. Reposts and requests that
/// yield a single segment come back as the one original request.
pub fn split_request(request: Request) -> Vec<Request> {
    if request.action == Action::Repost {
        return vec![request];
    }
    let Some(text) = request.rich_text.as_deref() else {
        return vec![request];
    };

    let segments: Vec<String> = THEMATIC_BREAK_RE
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if segments.is_empty() {
        // nothing but breaks and whitespace; leave an empty text for validation to reject
        let mut request = request;
        request.rich_text = Some(String::new());
        return vec![request];
    }
    if segments.len() == 1 {
        return vec![request];
    }

    debug!("Splitting request into a thread of {} posts", segments.len());
    segments
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut part = request.clone();
            if i > 0 {
                part.action = Action::Reply;
                part.reply_url = Some(ReplyTarget::WithinThread);
            }
            part.rich_text = Some(text);
            part
        })
        .collect()
}

/// Point a within-thread reply at the previous post and the thread root.
/// Other requests are left alone.
pub fn advance_thread(request: &mut Request, previous: &PostRef, root: &PostRef) {
    if !request.is_within_thread_reply() {
        return;
    }
    request.reply_info = Some(previous.clone());
    request.root_info = Some(root.clone());
    attach_reply(request);
    debug!("Reply in thread now points at {}", previous.uri);
}
