//! In-memory fakes for the [`Agent`] and [`Fetch`] seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::agent::{Agent, Fetch, FetchResponse, Profile};
use crate::error::{Error, Result};
use crate::feed::{Author, PostView, RecordView};
use crate::record::{BlobRef, CidLink, PostRecord, PostRef};

pub const FAKE_DID: &str = "did:plc:me";

#[derive(Default)]
pub struct FakeAgent {
    handles: Mutex<HashMap<String, String>>,
    posts: Mutex<HashMap<(String, String), String>>,
    feed: Mutex<Vec<PostView>>,
    pub created: Mutex<Vec<PostRecord>>,
    pub reposted: Mutex<Vec<PostRef>>,
    resolve_handle_calls: AtomicUsize,
    get_post_calls: AtomicUsize,
    upload_calls: AtomicUsize,
    create_calls: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_create_at: Mutex<Option<usize>>,
}

impl FakeAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handle(&self, handle: &str, did: &str) {
        self.handles
            .lock()
            .unwrap()
            .insert(handle.to_string(), did.to_string());
    }

    pub fn add_post(&self, did: &str, rkey: &str, cid: &str) {
        self.posts
            .lock()
            .unwrap()
            .insert((did.to_string(), rkey.to_string()), cid.to_string());
    }

    pub fn add_feed_post(&self, did: &str, handle: &str, rkey: &str, text: &str) {
        self.feed.lock().unwrap().push(PostView {
            uri: format!("at://{}/app.bsky.feed.post/{}", did, rkey),
            cid: format!("cid-{}", rkey),
            author: Author {
                did: did.to_string(),
                handle: handle.to_string(),
                display_name: None,
            },
            record: RecordView {
                text: text.to_string(),
                created_at: "2024-05-01T12:00:00.000Z".to_string(),
            },
            indexed_at: "2024-05-01T12:00:01.000Z".to_string(),
            like_count: Some(1),
            repost_count: Some(0),
            reply_count: Some(0),
        });
    }

    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    /// Make the `n`th (zero-based) `create_post` call fail.
    pub fn fail_create_at(&self, n: usize) {
        *self.fail_create_at.lock().unwrap() = Some(n);
    }

    pub fn resolve_handle_calls(&self) -> usize {
        self.resolve_handle_calls.load(Ordering::SeqCst)
    }

    pub fn get_post_calls(&self) -> usize {
        self.get_post_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }

    pub fn created_records(&self) -> Vec<PostRecord> {
        self.created.lock().unwrap().clone()
    }
}

fn not_found(what: &str) -> Error {
    Error::Api {
        status: 400,
        message: format!("{} not found", what),
    }
}

#[async_trait]
impl Agent for FakeAgent {
    async fn resolve_handle(&self, handle: &str) -> Result<String> {
        self.resolve_handle_calls.fetch_add(1, Ordering::SeqCst);
        self.handles
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .ok_or_else(|| not_found(handle))
    }

    async fn get_post(&self, did: &str, rkey: &str) -> Result<PostRef> {
        self.get_post_calls.fetch_add(1, Ordering::SeqCst);
        let cid = self
            .posts
            .lock()
            .unwrap()
            .get(&(did.to_string(), rkey.to_string()))
            .cloned()
            .ok_or_else(|| not_found(rkey))?;
        Ok(PostRef {
            uri: format!("at://{}/app.bsky.feed.post/{}", did, rkey),
            cid,
        })
    }

    async fn get_profile(&self, actor: &str) -> Result<Profile> {
        let handles = self.handles.lock().unwrap();
        handles
            .iter()
            .find(|(handle, did)| handle.as_str() == actor || did.as_str() == actor)
            .map(|(handle, did)| Profile {
                did: did.clone(),
                handle: handle.clone(),
                display_name: None,
            })
            .ok_or_else(|| not_found(actor))
    }

    async fn upload_blob(&self, data: Bytes, mime_type: &str) -> Result<BlobRef> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::Api {
                status: 413,
                message: "blob too large".to_string(),
            });
        }
        Ok(BlobRef {
            blob_type: "blob".to_string(),
            link: CidLink {
                link: format!("bafkrei-{}", data.len()),
            },
            mime_type: mime_type.to_string(),
            size: data.len() as u64,
        })
    }

    async fn create_post(&self, record: &PostRecord) -> Result<PostRef> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_create_at.lock().unwrap() == Some(n) {
            return Err(Error::Api {
                status: 500,
                message: "upstream failure".to_string(),
            });
        }
        self.created.lock().unwrap().push(record.clone());
        Ok(PostRef {
            uri: format!("at://{}/app.bsky.feed.post/post-{}", FAKE_DID, n),
            cid: format!("cid-post-{}", n),
        })
    }

    async fn create_repost(&self, subject: &PostRef) -> Result<PostRef> {
        let mut reposted = self.reposted.lock().unwrap();
        reposted.push(subject.clone());
        Ok(PostRef {
            uri: format!("at://{}/app.bsky.feed.repost/repost-{}", FAKE_DID, reposted.len()),
            cid: format!("cid-repost-{}", reposted.len()),
        })
    }

    async fn get_author_feed(&self, actor: &str, limit: u8) -> Result<Vec<PostView>> {
        Ok(self
            .feed
            .lock()
            .unwrap()
            .iter()
            .filter(|post| post.author.did == actor)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeFetch {
    responses: Mutex<HashMap<String, FetchResponse>>,
    calls: Mutex<Vec<String>>,
}

impl FakeFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_page(&self, url: &str, html: &str) {
        self.add_response(url, 200, Some("text/html; charset=utf-8"), html.as_bytes().to_vec());
    }

    pub fn add_image(&self, url: &str, content_type: &str, data: &[u8]) {
        self.add_response(url, 200, Some(content_type), data.to_vec());
    }

    pub fn add_response(&self, url: &str, status: u16, content_type: Option<&str>, body: Vec<u8>) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            FetchResponse {
                status,
                content_type: content_type.map(str::to_string),
                body: Bytes::from(body),
            },
        );
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetch for FakeFetch {
    async fn fetch(&self, url: &str) -> Result<FetchResponse> {
        self.calls.lock().unwrap().push(url.to_string());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(FetchResponse {
                status: 404,
                content_type: None,
                body: Bytes::new(),
            }))
    }
}
