//! The remote side: an XRPC client for the Bluesky API and a plain HTTP
//! fetcher for link-card pages and images.
//!
//! Both sit behind traits ([`Agent`], [`Fetch`]) so the compiler and the
//! submission driver can be driven by fakes in tests.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::feed::PostView;
use crate::record::{BlobRef, PostRecord, PostRef, POST_COLLECTION, REPOST_COLLECTION};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";
pub const PUBLIC_API: &str = "https://public.api.bsky.app";

const USER_AGENT: &str = concat!("bsky-post/", env!("CARGO_PKG_VERSION"));

/// App-password login for one account.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base URL of the PDS (or AppView, for read-only use)
    pub service: String,
    pub timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            service: DEFAULT_SERVICE.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub did: String,
    pub handle: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Calls the core needs from the social-network API.
#[async_trait]
pub trait Agent: Send + Sync {
    async fn resolve_handle(&self, handle: &str) -> Result<String>;

    /// Look up a post by owner DID and record key.
    async fn get_post(&self, did: &str, rkey: &str) -> Result<PostRef>;

    async fn get_profile(&self, actor: &str) -> Result<Profile>;

    async fn upload_blob(&self, data: Bytes, mime_type: &str) -> Result<BlobRef>;

    async fn create_post(&self, record: &PostRecord) -> Result<PostRef>;

    async fn create_repost(&self, subject: &PostRef) -> Result<PostRef>;

    async fn get_author_feed(&self, actor: &str, limit: u8) -> Result<Vec<PostView>>;
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Plain HTTP GET, used for link-card pages and their images.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse>;
}

#[async_trait]
impl Fetch for reqwest::Client {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        let response = self.get(url).send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }
}

// API Response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Session {
    access_jwt: String,
    did: String,
    handle: String,
}

#[derive(Debug, Deserialize)]
struct ResolveHandleResponse {
    did: String,
}

#[derive(Debug, Deserialize)]
struct GetRecordResponse {
    uri: String,
    cid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadBlobResponse {
    blob: BlobRef,
}

#[derive(Debug, Deserialize)]
struct AuthorFeedResponse {
    feed: Vec<FeedViewPost>,
}

#[derive(Debug, Deserialize)]
struct FeedViewPost {
    post: PostView,
}

#[derive(Debug, Deserialize)]
struct XrpcErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// XRPC client. Created either logged in (for writes) or anonymous against a
/// public AppView (reads only).
pub struct XrpcAgent {
    client: reqwest::Client,
    service: String,
    session: Option<Session>,
}

impl XrpcAgent {
    pub fn public(config: &AgentConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            service: config.service.trim_end_matches('/').to_string(),
            session: None,
        })
    }

    /// Log in with an app password via `com.atproto.server.createSession`.
    pub async fn login(config: &AgentConfig, credentials: &Credentials) -> Result<Self> {
        let mut agent = Self::public(config)?;

        let body = serde_json::json!({
            "identifier": credentials.identifier,
            "password": credentials.password,
        });
        let session: Session = agent
            .procedure("com.atproto.server.createSession", &body)
            .await?;

        info!("Logged in as {} ({})", session.handle, session.did);
        agent.session = Some(session);
        Ok(agent)
    }

    /// The underlying HTTP client, also usable as a [`Fetch`] implementation.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn did(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.did.as_str())
    }

    fn session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| Error::Precondition("this call requires a logged-in agent".to_string()))
    }

    fn xrpc_url(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service, nsid)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session {
            Some(session) => builder.header(AUTHORIZATION, format!("Bearer {}", session.access_jwt)),
            None => builder,
        }
    }

    async fn query<T: DeserializeOwned>(&self, nsid: &str, params: &[(&str, &str)]) -> Result<T> {
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = format!("{}?{}", self.xrpc_url(nsid), query);
        debug!("GET {}", url);

        let response = self.authorize(self.client.get(&url)).send().await?;
        read_json(response).await
    }

    async fn procedure<B, T>(&self, nsid: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        debug!("POST {}", nsid);
        let response = self
            .authorize(self.client.post(self.xrpc_url(nsid)))
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<XrpcErrorBody>(&text) {
            Ok(XrpcErrorBody {
                message: Some(message),
                ..
            }) => message,
            Ok(XrpcErrorBody {
                error: Some(error), ..
            }) => error,
            _ => text,
        };
        return Err(Error::Api {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response.json().await?)
}

#[async_trait]
impl Agent for XrpcAgent {
    async fn resolve_handle(&self, handle: &str) -> Result<String> {
        let response: ResolveHandleResponse = self
            .query("com.atproto.identity.resolveHandle", &[("handle", handle)])
            .await?;
        Ok(response.did)
    }

    async fn get_post(&self, did: &str, rkey: &str) -> Result<PostRef> {
        let response: GetRecordResponse = self
            .query(
                "com.atproto.repo.getRecord",
                &[("repo", did), ("collection", POST_COLLECTION), ("rkey", rkey)],
            )
            .await?;

        let cid = response.cid.ok_or_else(|| Error::RemoteLookup {
            reference: response.uri.clone(),
            reason: "record has no cid".to_string(),
        })?;
        Ok(PostRef {
            uri: response.uri,
            cid,
        })
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile> {
        self.query("app.bsky.actor.getProfile", &[("actor", actor)])
            .await
    }

    async fn upload_blob(&self, data: Bytes, mime_type: &str) -> Result<BlobRef> {
        self.session()?;
        let response = self
            .authorize(self.client.post(self.xrpc_url("com.atproto.repo.uploadBlob")))
            .header(CONTENT_TYPE, mime_type)
            .body(data)
            .send()
            .await?;
        let response: UploadBlobResponse = read_json(response).await?;
        Ok(response.blob)
    }

    async fn create_post(&self, record: &PostRecord) -> Result<PostRef> {
        let session = self.session()?;
        let body = serde_json::json!({
            "repo": session.did,
            "collection": POST_COLLECTION,
            "record": record,
        });
        self.procedure("com.atproto.repo.createRecord", &body).await
    }

    async fn create_repost(&self, subject: &PostRef) -> Result<PostRef> {
        let session = self.session()?;
        let body = serde_json::json!({
            "repo": session.did,
            "collection": REPOST_COLLECTION,
            "record": {
                "$type": REPOST_COLLECTION,
                "subject": subject,
                "createdAt": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            },
        });
        self.procedure("com.atproto.repo.createRecord", &body).await
    }

    async fn get_author_feed(&self, actor: &str, limit: u8) -> Result<Vec<PostView>> {
        let limit = limit.to_string();
        let response: AuthorFeedResponse = self
            .query(
                "app.bsky.feed.getAuthorFeed",
                &[
                    ("actor", actor),
                    ("filter", "posts_and_author_threads"),
                    ("limit", &limit),
                ],
            )
            .await?;
        Ok(response.feed.into_iter().map(|item| item.post).collect())
    }
}
