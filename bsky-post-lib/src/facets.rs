//! Rich-text facet detection: mentions, links and hashtags, as UTF-8 byte
//! ranges over the post text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::agent::Agent;
use crate::record::{ByteSlice, Facet, FacetFeature};

const MAX_TAG_CHARS: usize = 64;

static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s(])(@([a-zA-Z0-9](?:[a-zA-Z0-9.-]*[a-zA-Z0-9])?\.[a-zA-Z]{2,}))")
        .expect("mention regex")
});

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(])(https?://\S+)").expect("link regex"));

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)([#＃]([^\s#＃]+))").expect("tag regex"));

const TRAILING_PUNCTUATION: [char; 8] = ['.', ',', ';', ':', '!', '?', '"', '\''];

/// Strip sentence punctuation that is more likely to end the sentence than
/// the URL. Closing parens are kept only while the URL opened a matching one.
fn trim_link(url: &str) -> &str {
    let mut end = url.trim_end_matches(TRAILING_PUNCTUATION);
    while end.ends_with(')') && end.matches(')').count() > end.matches('(').count() {
        end = end[..end.len() - 1].trim_end_matches(TRAILING_PUNCTUATION);
    }
    end
}

fn link_facets(text: &str) -> Vec<Facet> {
    LINK_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| {
            let uri = trim_link(m.as_str());
            if uri.len() <= "https://".len() {
                return None;
            }
            Some(Facet {
                index: ByteSlice {
                    byte_start: m.start(),
                    byte_end: m.start() + uri.len(),
                },
                features: vec![FacetFeature::Link {
                    uri: uri.to_string(),
                }],
            })
        })
        .collect()
}

fn tag_facets(text: &str) -> Vec<Facet> {
    TAG_RE
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(1)?, caps.get(2)?)))
        .filter_map(|(whole, tag)| {
            let tag = tag
                .as_str()
                .trim_end_matches(|c: char| c.is_ascii_punctuation());
            if tag.is_empty()
                || tag.chars().all(|c| c.is_ascii_digit())
                || tag.chars().count() > MAX_TAG_CHARS
            {
                return None;
            }
            let marker_len = whole.as_str().chars().next().map_or(1, char::len_utf8);
            Some(Facet {
                index: ByteSlice {
                    byte_start: whole.start(),
                    byte_end: whole.start() + marker_len + tag.len(),
                },
                features: vec![FacetFeature::Tag {
                    tag: tag.to_string(),
                }],
            })
        })
        .collect()
}

/// Detect facets in `text`. Mention handles are resolved to DIDs through the
/// agent; mentions that don't resolve are left as plain text.
pub async fn detect_facets(agent: &dyn Agent, text: &str) -> Vec<Facet> {
    let mut facets = Vec::new();

    for caps in MENTION_RE.captures_iter(text) {
        let (Some(whole), Some(handle)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        match agent.resolve_handle(handle.as_str()).await {
            Ok(did) => facets.push(Facet {
                index: ByteSlice {
                    byte_start: whole.start(),
                    byte_end: whole.end(),
                },
                features: vec![FacetFeature::Mention { did }],
            }),
            Err(e) => debug!("Skipping mention of {}: {}", handle.as_str(), e),
        }
    }

    facets.extend(link_facets(text));
    facets.extend(tag_facets(text));
    facets.sort_by_key(|f| f.index.byte_start);
    facets
}
