//! Wire types for `app.bsky.feed.post` records and the references they carry.

use serde::{Deserialize, Serialize};

pub const POST_COLLECTION: &str = "app.bsky.feed.post";
pub const REPOST_COLLECTION: &str = "app.bsky.feed.repost";

/// A strong reference to an existing post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

/// A compiled post, ready to be passed to `createRecord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRecord {
    #[serde(rename = "$type")]
    pub record_type: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<Facet>,
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embed: Option<Embed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<ReplyRef>,
}

impl PostRecord {
    pub fn new(text: String, facets: Vec<Facet>, created_at: String) -> Self {
        Self {
            record_type: POST_COLLECTION.to_string(),
            text,
            facets,
            created_at,
            embed: None,
            reply: None,
        }
    }

    /// The link card embedded in this record, if any.
    pub fn external_card_mut(&mut self) -> Option<&mut ExternalCard> {
        match self.embed.as_mut() {
            Some(Embed::External { external }) => Some(external),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyRef {
    pub root: PostRef,
    pub parent: PostRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum Embed {
    /// Quote post
    #[serde(rename = "app.bsky.embed.record")]
    Record { record: PostRef },

    /// Website card
    #[serde(rename = "app.bsky.embed.external")]
    External { external: ExternalCard },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCard {
    pub uri: String,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<Thumbnail>,
}

/// A link card image, either still to be uploaded or already stored as a blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Thumbnail {
    Pending {
        #[serde(rename = "$TO_BE_UPLOADED")]
        url: String,
    },
    Uploaded(BlobRef),
}

/// Reference to an uploaded blob, as returned by `com.atproto.repo.uploadBlob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    #[serde(rename = "$type")]
    pub blob_type: String,
    #[serde(rename = "ref")]
    pub link: CidLink,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CidLink {
    #[serde(rename = "$link")]
    pub link: String,
}

/// An annotated byte range of the post text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Facet {
    pub index: ByteSlice,
    pub features: Vec<FacetFeature>,
}

/// UTF-8 byte offsets, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ByteSlice {
    pub byte_start: usize,
    pub byte_end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "$type")]
pub enum FacetFeature {
    #[serde(rename = "app.bsky.richtext.facet#mention")]
    Mention { did: String },

    #[serde(rename = "app.bsky.richtext.facet#link")]
    Link { uri: String },

    #[serde(rename = "app.bsky.richtext.facet#tag")]
    Tag { tag: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_thumbnail_wire_shape() {
        let thumb = Thumbnail::Pending {
            url: "https://example.com/a.png".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&thumb).unwrap(),
            serde_json::json!({ "$TO_BE_UPLOADED": "https://example.com/a.png" })
        );
    }

    #[test]
    fn test_uploaded_thumbnail_parses_as_blob() {
        let value = serde_json::json!({
            "$type": "blob",
            "ref": { "$link": "bafkreiabc" },
            "mimeType": "image/png",
            "size": 42
        });
        let thumb: Thumbnail = serde_json::from_value(value).unwrap();
        match thumb {
            Thumbnail::Uploaded(blob) => {
                assert_eq!(blob.link.link, "bafkreiabc");
                assert_eq!(blob.size, 42);
            }
            other => panic!("expected uploaded blob, got {:?}", other),
        }
    }

    #[test]
    fn test_quote_embed_tagged_with_type() {
        let embed = Embed::Record {
            record: PostRef {
                uri: "at://did:plc:abc/app.bsky.feed.post/1".to_string(),
                cid: "cid1".to_string(),
            },
        };
        let value = serde_json::to_value(&embed).unwrap();
        assert_eq!(value["$type"], "app.bsky.embed.record");
        assert_eq!(value["record"]["cid"], "cid1");
    }
}
