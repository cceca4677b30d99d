//! Field checks run before anything touches the network.

use std::collections::HashMap;

use crate::agent::Credentials;
use crate::error::{Error, Result};
use crate::request::{Action, ReplyTarget, Request};

pub const DEFAULT_ENV_PREFIX: &str = "BLUESKY";
pub const MAX_POST_CHARS: usize = 300;

fn require_text(request: &Request) -> Result<()> {
    let text = request
        .rich_text
        .as_deref()
        .ok_or_else(|| Error::Validation(r#"JSON must contain "richText" field"#.to_string()))?;

    let len = text.chars().count();
    if len == 0 {
        return Err(Error::Validation(r#""richText" must not be empty"#.to_string()));
    }
    if len > MAX_POST_CHARS {
        return Err(Error::Validation(format!(
            r#""richText" is {} characters, the limit is {}"#,
            len, MAX_POST_CHARS
        )));
    }
    Ok(())
}

fn require(present: bool, field: &str) -> Result<()> {
    if present {
        Ok(())
    } else {
        Err(Error::Validation(format!(r#"JSON must contain "{}" field"#, field)))
    }
}

/// Check the fields the request's action needs. The first violated rule is
/// reported.
pub fn validate_request(request: &Request) -> Result<()> {
    let has_repost_url = request.repost_url.as_deref().is_some_and(|u| !u.is_empty());

    match &request.action {
        Action::Post => require_text(request),
        Action::Repost => require(has_repost_url, "repostURL"),
        Action::QuotePost => {
            require_text(request)?;
            require(has_repost_url, "repostURL")
        }
        Action::Reply => {
            require_text(request)?;
            let has_reply_url = match &request.reply_url {
                Some(ReplyTarget::WithinThread) => true,
                Some(ReplyTarget::External(url)) => !url.is_empty(),
                None => false,
            };
            require(has_reply_url, "replyURL")
        }
        Action::Unknown(other) => Err(Error::Validation(format!("Unknown action {}", other))),
        Action::Missing => Err(Error::Validation(r#"JSON must contain "action" field"#.to_string())),
    }
}

/// Look up `<PREFIX>_IDENTIFIER_<account>` and `<PREFIX>_APP_PASSWORD_<account>`.
pub fn validate_account(
    request: &Request,
    prefix: &str,
    env: &HashMap<String, String>,
) -> Result<Credentials> {
    if request.account.is_empty() {
        return Err(Error::Validation(r#"JSON must contain "account" field"#.to_string()));
    }

    let lookup = |kind: &str| {
        let key = format!("{}_{}_{}", prefix, kind, request.account);
        env.get(&key)
            .filter(|v| !v.is_empty())
            .cloned()
            .ok_or_else(|| {
                Error::MissingCredentials(format!("Must provide {} in the environment", key))
            })
    };

    Ok(Credentials {
        identifier: lookup("IDENTIFIER")?,
        password: lookup("APP_PASSWORD")?,
    })
}
