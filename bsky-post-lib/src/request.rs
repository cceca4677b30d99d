//! The JSON request a user drops into the queue directory, plus the fields
//! filled in as it moves through the pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::record::{PostRecord, PostRef};

/// Serialized value of [`ReplyTarget::WithinThread`].
pub const REPLY_IN_THREAD: &str = "REPLY_IN_THREAD";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    Post,
    Repost,
    QuotePost,
    Reply,
    /// Anything else; rejected by validation rather than by parsing.
    Unknown(String),
    #[default]
    Missing,
}

impl From<String> for Action {
    fn from(value: String) -> Self {
        match value.as_str() {
            "post" => Action::Post,
            "repost" => Action::Repost,
            "quote-post" => Action::QuotePost,
            "reply" => Action::Reply,
            "" => Action::Missing,
            _ => Action::Unknown(value),
        }
    }
}

impl From<Action> for String {
    fn from(action: Action) -> Self {
        action.to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Post => f.write_str("post"),
            Action::Repost => f.write_str("repost"),
            Action::QuotePost => f.write_str("quote-post"),
            Action::Reply => f.write_str("reply"),
            Action::Unknown(other) => f.write_str(other),
            Action::Missing => Ok(()),
        }
    }
}

/// What a reply points at: a post outside this request, or the previous
/// post of the thread being submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReplyTarget {
    External(String),
    WithinThread,
}

impl From<String> for ReplyTarget {
    fn from(value: String) -> Self {
        if value == REPLY_IN_THREAD {
            ReplyTarget::WithinThread
        } else {
            ReplyTarget::External(value)
        }
    }
}

impl From<ReplyTarget> for String {
    fn from(target: ReplyTarget) -> Self {
        match target {
            ReplyTarget::External(url) => url,
            ReplyTarget::WithinThread => REPLY_IN_THREAD.to_string(),
        }
    }
}

/// A post request. The `*_info`, `record` and `result` fields start empty and
/// are filled in place by the compiler, the thread sequencer and the
/// submission driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub account: String,

    #[serde(default)]
    pub action: Action,

    #[serde(rename = "richText", default, skip_serializing_if = "Option::is_none")]
    pub rich_text: Option<String>,

    #[serde(rename = "richTextFile", default, skip_serializing_if = "Option::is_none")]
    pub rich_text_file: Option<String>,

    #[serde(rename = "repostURL", default, skip_serializing_if = "Option::is_none")]
    pub repost_url: Option<String>,

    #[serde(rename = "replyURL", default, skip_serializing_if = "Option::is_none")]
    pub reply_url: Option<ReplyTarget>,

    #[serde(rename = "repostInfo", default, skip_serializing_if = "Option::is_none")]
    pub repost_info: Option<PostRef>,

    #[serde(rename = "replyInfo", default, skip_serializing_if = "Option::is_none")]
    pub reply_info: Option<PostRef>,

    #[serde(rename = "rootInfo", default, skip_serializing_if = "Option::is_none")]
    pub root_info: Option<PostRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<PostRecord>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<PostRef>,

    /// Fields we don't interpret are carried through to the archive.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Request {
    pub fn new(account: impl Into<String>, action: Action) -> Self {
        Self {
            account: account.into(),
            action,
            rich_text: None,
            rich_text_file: None,
            repost_url: None,
            reply_url: None,
            repost_info: None,
            reply_info: None,
            root_info: None,
            record: None,
            result: None,
            extra: Map::new(),
        }
    }

    pub fn with_rich_text(mut self, text: impl Into<String>) -> Self {
        self.rich_text = Some(text.into());
        self
    }

    pub fn with_repost_url(mut self, url: impl Into<String>) -> Self {
        self.repost_url = Some(url.into());
        self
    }

    pub fn with_reply_to(mut self, target: ReplyTarget) -> Self {
        self.reply_url = Some(target);
        self
    }

    pub fn is_within_thread_reply(&self) -> bool {
        matches!(self.reply_url, Some(ReplyTarget::WithinThread))
    }
}
