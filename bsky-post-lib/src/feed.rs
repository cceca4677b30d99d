//! An account's recent posts, as returned by `getAuthorFeed`, flattened into
//! a compact JSON listing with public URLs.

use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::error::Result;
use crate::reference::at_uri_to_web_url;

pub const MAX_FEED_LIMIT: u8 = 100;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostView {
    pub uri: String,
    pub cid: String,
    pub author: Author,
    pub record: RecordView,
    #[serde(rename = "indexedAt")]
    pub indexed_at: String,
    #[serde(rename = "likeCount")]
    pub like_count: Option<u64>,
    #[serde(rename = "repostCount")]
    pub repost_count: Option<u64>,
    #[serde(rename = "replyCount")]
    pub reply_count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Author {
    pub did: String,
    pub handle: String,
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordView {
    #[serde(default)]
    pub text: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
}

/// What `bsky-feed` prints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedOutput {
    pub author: AuthorOutput,
    pub posts: Vec<PostOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorOutput {
    pub did: String,
    pub handle: String,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostOutput {
    pub uri: String,
    pub url: String,
    pub text: String,
    pub created_at: String,
    pub likes: Option<u64>,
    pub reposts: Option<u64>,
    pub replies: Option<u64>,
}

impl From<&PostView> for PostOutput {
    fn from(post: &PostView) -> Self {
        PostOutput {
            uri: post.uri.clone(),
            url: at_uri_to_web_url(&post.uri, &post.author.handle),
            text: post.record.text.clone(),
            created_at: post.record.created_at.clone(),
            likes: post.like_count,
            reposts: post.repost_count,
            replies: post.reply_count,
        }
    }
}

/// Fetch an account's recent posts and threads.
///
/// # Arguments
/// * `actor` - A handle or DID
/// * `limit` - Number of posts, clamped to 1..=100
pub async fn fetch_author_feed(agent: &dyn Agent, actor: &str, limit: u8) -> Result<FeedOutput> {
    let profile = agent.get_profile(actor).await?;
    let limit = limit.clamp(1, MAX_FEED_LIMIT);
    let posts = agent.get_author_feed(&profile.did, limit).await?;

    Ok(FeedOutput {
        author: AuthorOutput {
            did: profile.did,
            handle: profile.handle,
            display_name: profile.display_name,
        },
        posts: posts.iter().map(PostOutput::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAgent;

    #[tokio::test]
    async fn test_feed_posts_get_public_urls() {
        let agent = FakeAgent::new();
        agent.add_handle("alice.test", "did:plc:alice");
        agent.add_feed_post("did:plc:alice", "alice.test", "3kabc", "first!");

        let feed = fetch_author_feed(&agent, "alice.test", 10).await.unwrap();
        assert_eq!(feed.author.did, "did:plc:alice");
        assert_eq!(feed.posts.len(), 1);
        assert_eq!(
            feed.posts[0].url,
            "https://bsky.app/profile/alice.test/post/3kabc"
        );
        assert_eq!(feed.posts[0].text, "first!");
    }
}
