//! Website card embeds: find the first URL in a post, scrape its Open Graph
//! tags, and later upload the preview image.
//!
//! See <https://docs.bsky.app/docs/advanced-guides/posts#website-card-embeds>.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::{info, warn};

use crate::agent::{Agent, Fetch};
use crate::error::{Error, Result};
use crate::record::{BlobRef, ExternalCard, Thumbnail};

const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

// First URL, up to whitespace, brackets, quotes or angle brackets
static BARE_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"https?://[^\s\]\["'<>]+"#).expect("bare url regex"));

/// The Open Graph fields a card is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenGraph {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

pub fn find_first_url(text: &str) -> Option<&str> {
    BARE_URL_RE.find(text).map(|m| m.as_str())
}

/// Resolve a potentially relative URL against the page it was found on
pub fn resolve_url(base: &str, relative: &str) -> String {
    if relative.starts_with("http://") || relative.starts_with("https://") {
        return relative.to_string();
    }
    match url::Url::parse(base).and_then(|b| b.join(relative)) {
        Ok(joined) => joined.to_string(),
        Err(_) => {
            let base_dir = base.rsplit_once('/').map(|(b, _)| b).unwrap_or(base);
            format!("{}/{}", base_dir, relative.trim_start_matches('/'))
        }
    }
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_string)
}

pub fn parse_open_graph(html: &str) -> OpenGraph {
    let document = Html::parse_document(html);
    let title = Selector::parse(r#"meta[property="og:title"]"#).expect("Invalid og:title selector");
    let description =
        Selector::parse(r#"meta[property="og:description"]"#).expect("Invalid og:description selector");
    let image = Selector::parse(r#"meta[property="og:image"]"#).expect("Invalid og:image selector");

    OpenGraph {
        title: meta_content(&document, &title),
        description: meta_content(&document, &description),
        image: meta_content(&document, &image),
    }
}

/// Fetch `url` and build a card from its Open Graph tags. The image, if any,
/// is left as a pending upload.
pub async fn fetch_link_card(fetch: &dyn Fetch, url: &str) -> Result<ExternalCard> {
    info!("Fetching embed card from {}", url);

    let failed = |reason: String| Error::LinkCard {
        url: url.to_string(),
        reason,
    };

    let response = fetch.fetch(url).await.map_err(|e| failed(e.to_string()))?;
    if !response.is_success() {
        return Err(failed(format!("server returned {}", response.status)));
    }

    let html = String::from_utf8_lossy(&response.body);
    let og = parse_open_graph(&html);

    Ok(ExternalCard {
        uri: url.to_string(),
        title: og.title.unwrap_or_default(),
        description: og.description.unwrap_or_default(),
        thumb: og.image.map(|image| Thumbnail::Pending {
            url: resolve_url(url, &image),
        }),
    })
}

async fn fetch_and_upload(agent: &dyn Agent, fetch: &dyn Fetch, url: &str) -> Result<BlobRef> {
    let response = fetch.fetch(url).await?;
    if !response.is_success() {
        return Err(Error::LinkCard {
            url: url.to_string(),
            reason: format!("image fetch returned {}", response.status),
        });
    }

    let mime_type = response
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(str::trim)
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or(DEFAULT_IMAGE_MIME)
        .to_string();

    info!("Uploading image {} ({} bytes, {})", url, response.body.len(), mime_type);
    agent.upload_blob(response.body, &mime_type).await
}

/// Replace a pending thumbnail with an uploaded blob. A failed fetch or
/// upload drops the thumbnail and keeps the rest of the card.
pub async fn upload_pending_thumbnail(agent: &dyn Agent, fetch: &dyn Fetch, card: &mut ExternalCard) {
    let Some(Thumbnail::Pending { url }) = card.thumb.clone() else {
        return;
    };

    match fetch_and_upload(agent, fetch, &url).await {
        Ok(blob) => card.thumb = Some(Thumbnail::Uploaded(blob)),
        Err(e) => {
            warn!("Failed to fetch or upload image {}: {}", url, e);
            card.thumb = None;
        }
    }
}
