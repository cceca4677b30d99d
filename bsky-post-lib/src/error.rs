//! Error types for request processing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while validating, compiling, submitting or
/// archiving a post request.
#[derive(Debug, Error)]
pub enum Error {
    /// A request field is missing or malformed
    #[error("invalid request: {0}")]
    Validation(String),

    /// The account's identifier or app password is not in the environment
    #[error("missing credentials: {0}")]
    MissingCredentials(String),

    /// A post reference matches neither the web URL nor the at:// URI shape
    #[error("malformed post reference {0:?}")]
    MalformedReference(String),

    /// The API could not find the handle or post a reference points at
    #[error("could not look up {reference}: {reason}")]
    RemoteLookup { reference: String, reason: String },

    /// An internal invariant was violated
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// The processed request could not be written to the archive
    #[error("failed to archive to {}: {reason}", path.display())]
    ArchiveWrite { path: PathBuf, reason: String },

    /// The page behind a link card could not be fetched
    #[error("failed to build link card for {url}: {reason}")]
    LinkCard { url: String, reason: String },

    /// The XRPC endpoint answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
