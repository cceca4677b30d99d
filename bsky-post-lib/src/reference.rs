//! Turning post URLs and `at://` URIs into `{uri, cid}` references.

use tracing::debug;

use crate::agent::Agent;
use crate::error::{Error, Result};
use crate::record::{PostRef, POST_COLLECTION};

const WEB_BASE: &str = "https://bsky.app";

/// Something that names a post: either text still to be resolved, or a
/// reference resolved earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    Unresolved(String),
    Resolved(PostRef),
}

impl From<&str> for Reference {
    fn from(value: &str) -> Self {
        Reference::Unresolved(value.to_string())
    }
}

impl From<String> for Reference {
    fn from(value: String) -> Self {
        Reference::Unresolved(value)
    }
}

impl From<PostRef> for Reference {
    fn from(value: PostRef) -> Self {
        Reference::Resolved(value)
    }
}

pub(crate) fn at_uri_to_web_url(at_uri: &str, handle: &str) -> String {
    // Convert at://did:plc:xxx/app.bsky.feed.post/yyy to https://bsky.app/profile/handle/post/yyy
    let post_id = at_uri.rsplit('/').next().unwrap_or("");
    format!("{}/profile/{}/post/{}", WEB_BASE, handle, post_id)
}

/// Parse a Bluesky URL and extract the handle (or DID) and post ID.
///
/// # Example
/// ```
/// use bsky_post_lib::parse_bsky_url;
/// let (handle, post_id) = parse_bsky_url("https://bsky.app/profile/simonwillison.net/post/3m7gzjew3ss2e").unwrap();
/// assert_eq!(handle, "simonwillison.net");
/// assert_eq!(post_id, "3m7gzjew3ss2e");
/// ```
pub fn parse_bsky_url(url: &str) -> Result<(String, String)> {
    let malformed = || Error::MalformedReference(url.to_string());

    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(malformed());
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let path = path.trim_end_matches('/');
    let parts: Vec<&str> = path.split('/').collect();

    // .../profile/<actor>/post/<id> must be the tail of the path
    let profile_idx = parts
        .iter()
        .position(|&p| p == "profile")
        .ok_or_else(malformed)?;
    if parts.len() != profile_idx + 4 || parts[profile_idx + 2] != "post" {
        return Err(malformed());
    }

    let handle = parts[profile_idx + 1];
    let post_id = parts[profile_idx + 3];
    if handle.is_empty() || post_id.is_empty() {
        return Err(malformed());
    }

    Ok((handle.to_string(), post_id.to_string()))
}

/// Parse `at://<did>/app.bsky.feed.post/<id>` into the DID and post ID.
pub fn parse_post_uri(uri: &str) -> Result<(String, String)> {
    let malformed = || Error::MalformedReference(uri.to_string());

    let rest = uri.strip_prefix("at://").ok_or_else(malformed)?;
    let mut parts = rest.split('/');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(did), Some(collection), Some(post_id), None)
            if !did.is_empty() && collection == POST_COLLECTION && !post_id.is_empty() =>
        {
            Ok((did.to_string(), post_id.to_string()))
        }
        _ => Err(malformed()),
    }
}

fn parse_any(reference: &str) -> Result<(String, String)> {
    if reference.starts_with("at://") {
        parse_post_uri(reference)
    } else {
        parse_bsky_url(reference)
    }
}

fn lookup_failed(reference: &str) -> impl FnOnce(Error) -> Error + '_ {
    move |e| match e {
        Error::RemoteLookup { .. } => e,
        other => Error::RemoteLookup {
            reference: reference.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Resolve a post URL or URI into a `{uri, cid}` reference.
///
/// Handles cost one `resolveHandle` round-trip; DIDs are used as-is. An
/// already resolved reference is returned without touching the network.
pub async fn resolve(agent: &dyn Agent, reference: impl Into<Reference>) -> Result<PostRef> {
    let text = match reference.into() {
        Reference::Resolved(post) => return Ok(post),
        Reference::Unresolved(text) => text,
    };

    let (actor, post_id) = parse_any(&text)?;

    // Resolve handle to DID (unless it's already a DID)
    let did = if actor.starts_with("did:") {
        actor
    } else {
        agent
            .resolve_handle(&actor)
            .await
            .map_err(lookup_failed(&actor))?
    };

    let post = agent
        .get_post(&did, &post_id)
        .await
        .map_err(lookup_failed(&text))?;

    let uri = format!("at://{}/{}/{}", did, POST_COLLECTION, post_id);
    debug!("Resolved {} to {} ({})", text, uri, post.cid);
    Ok(PostRef { uri, cid: post.cid })
}

/// Turn an `at://` post URI into its public web URL, looking up the owner's
/// current handle.
pub async fn post_url_from_uri(agent: &dyn Agent, uri: &str) -> Result<String> {
    let (did, _) = parse_post_uri(uri)?;
    let profile = agent.get_profile(&did).await.map_err(lookup_failed(&did))?;
    Ok(at_uri_to_web_url(uri, &profile.handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAgent;

    #[test]
    fn test_parse_bsky_url() {
        let (handle, post_id) =
            parse_bsky_url("https://bsky.app/profile/user.bsky.social/post/abc123").unwrap();
        assert_eq!(handle, "user.bsky.social");
        assert_eq!(post_id, "abc123");
    }

    #[test]
    fn test_parse_bsky_url_with_query() {
        let (handle, post_id) =
            parse_bsky_url("https://bsky.app/profile/user.bsky.social/post/abc123?ref=share")
                .unwrap();
        assert_eq!(handle, "user.bsky.social");
        assert_eq!(post_id, "abc123");
    }

    #[test]
    fn test_parse_bsky_url_rejects_other_shapes() {
        for url in [
            "https://bsky.app/profile/user.bsky.social",
            "https://bsky.app/profile/user.bsky.social/post/",
            "https://bsky.app/profile/user.bsky.social/lists/abc",
            "bsky.app/profile/user.bsky.social/post/abc",
            "not a url",
        ] {
            assert!(
                matches!(parse_bsky_url(url), Err(Error::MalformedReference(_))),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_parse_post_uri() {
        let (did, post_id) =
            parse_post_uri("at://did:plc:abc/app.bsky.feed.post/3kxyz").unwrap();
        assert_eq!(did, "did:plc:abc");
        assert_eq!(post_id, "3kxyz");

        assert!(parse_post_uri("at://did:plc:abc/app.bsky.feed.like/3kxyz").is_err());
        assert!(parse_post_uri("https://did:plc:abc/app.bsky.feed.post/3kxyz").is_err());
    }

    #[tokio::test]
    async fn test_handle_url_costs_one_lookup() {
        let agent = FakeAgent::new();
        agent.add_handle("alice.test", "did:plc:alice");
        agent.add_post("did:plc:alice", "123", "cid-123");

        let post = resolve(&agent, "https://bsky.app/profile/alice.test/post/123")
            .await
            .unwrap();
        assert_eq!(post.uri, "at://did:plc:alice/app.bsky.feed.post/123");
        assert_eq!(post.cid, "cid-123");
        assert_eq!(agent.resolve_handle_calls(), 1);
    }

    #[tokio::test]
    async fn test_did_url_skips_handle_lookup() {
        let agent = FakeAgent::new();
        agent.add_post("did:plc:alice", "123", "cid-123");

        let post = resolve(&agent, "https://bsky.app/profile/did:plc:alice/post/123")
            .await
            .unwrap();
        assert_eq!(post.cid, "cid-123");
        assert_eq!(agent.resolve_handle_calls(), 0);

        let post = resolve(&agent, "at://did:plc:alice/app.bsky.feed.post/123")
            .await
            .unwrap();
        assert_eq!(post.uri, "at://did:plc:alice/app.bsky.feed.post/123");
        assert_eq!(agent.resolve_handle_calls(), 0);
    }

    #[tokio::test]
    async fn test_resolved_reference_is_returned_untouched() {
        let agent = FakeAgent::new();
        let known = PostRef {
            uri: "at://did:plc:x/app.bsky.feed.post/1".to_string(),
            cid: "c1".to_string(),
        };
        let post = resolve(&agent, known.clone()).await.unwrap();
        assert_eq!(post, known);
        assert_eq!(agent.get_post_calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_post_is_remote_lookup_error() {
        let agent = FakeAgent::new();
        agent.add_handle("alice.test", "did:plc:alice");

        let err = resolve(&agent, "https://bsky.app/profile/alice.test/post/404")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteLookup { .. }), "{:?}", err);

        let err = resolve(&agent, "https://bsky.app/profile/ghost.test/post/1")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RemoteLookup { ref reference, .. } if reference == "ghost.test"));
    }

    #[tokio::test]
    async fn test_post_url_from_uri() {
        let agent = FakeAgent::new();
        agent.add_handle("alice.test", "did:plc:alice");

        let url = post_url_from_uri(&agent, "at://did:plc:alice/app.bsky.feed.post/3kabc")
            .await
            .unwrap();
        assert_eq!(url, "https://bsky.app/profile/alice.test/post/3kabc");
    }
}
