//! Turning a validated request into an `app.bsky.feed.post` record.

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info};

use crate::agent::{Agent, Fetch};
use crate::card::{fetch_link_card, find_first_url, upload_pending_thumbnail};
use crate::error::Result;
use crate::facets::detect_facets;
use crate::record::{Embed, PostRecord, ReplyRef};
use crate::reference::resolve;
use crate::request::{ReplyTarget, Request};

/// Set the record's reply field from the request's resolved references.
/// The root defaults to the parent when the request is not part of a thread.
pub(crate) fn attach_reply(request: &mut Request) {
    let Some(parent) = request.reply_info.clone() else {
        return;
    };
    let root = request.root_info.clone().unwrap_or_else(|| parent.clone());
    if let Some(record) = request.record.as_mut() {
        record.reply = Some(ReplyRef { root, parent });
    }
}

/// Compiles requests into records using one agent and one fetcher.
#[derive(Clone, Copy)]
pub struct RecordCompiler<'a> {
    agent: &'a dyn Agent,
    fetch: &'a dyn Fetch,
}

impl<'a> RecordCompiler<'a> {
    pub fn new(agent: &'a dyn Agent, fetch: &'a dyn Fetch) -> Self {
        Self { agent, fetch }
    }

    pub fn agent(&self) -> &'a dyn Agent {
        self.agent
    }

    /// Resolve references, build the record and, when `upload_media` is
    /// set, upload the link card image.
    ///
    /// Safe to call more than once on the same request: work already
    /// reflected in the request (resolved references, the record itself) is
    /// not redone, so a `false` pass followed by a `true` pass only adds the
    /// upload.
    pub async fn compile(&self, request: &mut Request, upload_media: bool) -> Result<()> {
        debug!("Compiling {} request, upload_media = {}", request.action, upload_media);

        if request.repost_info.is_none() {
            if let Some(url) = request.repost_url.as_deref() {
                request.repost_info = Some(resolve(self.agent, url).await?);
            }
        }

        if request.reply_info.is_none() {
            if let Some(ReplyTarget::External(url)) = request.reply_url.as_ref() {
                request.reply_info = Some(resolve(self.agent, url.as_str()).await?);
            }
        }

        if request.record.is_none() {
            if let Some(text) = request.rich_text.clone() {
                request.record = Some(self.build_record(request, text).await?);
                attach_reply(request);
            }
        }

        if upload_media {
            if let Some(card) = request.record.as_mut().and_then(PostRecord::external_card_mut) {
                upload_pending_thumbnail(self.agent, self.fetch, card).await;
            }
        }

        Ok(())
    }

    async fn build_record(&self, request: &Request, text: String) -> Result<PostRecord> {
        let facets = detect_facets(self.agent, &text).await;
        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut record = PostRecord::new(text, facets, created_at);

        // A quoted post wins over any link card
        if let Some(quoted) = request.repost_info.clone() {
            record.embed = Some(Embed::Record { record: quoted });
        } else if let Some(url) = find_first_url(&record.text) {
            let card = fetch_link_card(self.fetch, url).await?;
            record.embed = Some(Embed::External { external: card });
        }

        info!(
            "Generated record with {} facets{}",
            record.facets.len(),
            match &record.embed {
                Some(Embed::Record { .. }) => ", quoting a post",
                Some(Embed::External { .. }) => ", with a link card",
                None => "",
            }
        );
        Ok(record)
    }
}
