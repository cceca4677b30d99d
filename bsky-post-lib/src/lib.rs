//! Library for posting to Bluesky from JSON request files
//!
//! A request names an account and an action (`post`, `repost`,
//! `quote-post`, `reply`). This library handles:
//! - Validating requests and looking up the account's app password
//! - Splitting text with thematic breaks (`---`) into a thread
//! - Resolving post URLs into `{uri, cid}` references
//! - Compiling records with facets, quote embeds and link cards
//! - Submitting posts in order, chaining thread replies
//! - Archiving the processed request next to the queue directory

pub mod agent;
pub mod archive;
pub mod card;
pub mod compiler;
pub mod error;
pub mod facets;
pub mod feed;
pub mod pipeline;
pub mod record;
pub mod reference;
pub mod request;
pub mod submit;
pub mod thread;
pub mod validator;

#[cfg(test)]
mod testing;

pub use agent::{Agent, AgentConfig, Credentials, Fetch, FetchResponse, Profile, XrpcAgent};
pub use archive::archive;
pub use compiler::RecordCompiler;
pub use error::{Error, Result};
pub use feed::{fetch_author_feed, FeedOutput};
pub use pipeline::{load_batch, process_batch, Batch, Processed};
pub use record::{Embed, PostRecord, PostRef};
pub use reference::{parse_bsky_url, post_url_from_uri, resolve};
pub use request::{Action, ReplyTarget, Request};
pub use submit::{prepare, submit};
pub use thread::{advance_thread, split_request};
pub use validator::{validate_account, validate_request, DEFAULT_ENV_PREFIX};
