//! Content item model: the unified record for aggregated posts, videos,
//! podcast episodes and essays.
//!
//! All sources share one base row (title, publish/edit dates, description,
//! download bookkeeping). Variant fields live in a per-kind payload that is
//! persisted as JSONB, so adding a source never touches the base schema.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// KINDS & FACETS
// =============================================================================

/// Concrete content source kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Youtube,
    Spotify,
    ObPost,
    Essay,
}

/// Broad medium grouping over kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFacet {
    Video,
    Audio,
    Text,
}

/// Static metadata about the site a kind's content lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteMeta {
    pub site_name: &'static str,
    pub site_url: &'static str,
}

impl ContentKind {
    /// All kinds, in registry order.
    pub const ALL: [ContentKind; 4] = [
        ContentKind::Youtube,
        ContentKind::Spotify,
        ContentKind::ObPost,
        ContentKind::Essay,
    ];

    /// Stable string form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Youtube => "youtube",
            ContentKind::Spotify => "spotify",
            ContentKind::ObPost => "ob_post",
            ContentKind::Essay => "essay",
        }
    }

    /// The medium this kind belongs to.
    pub fn facet(&self) -> ContentFacet {
        match self {
            ContentKind::Youtube => ContentFacet::Video,
            ContentKind::Spotify => ContentFacet::Audio,
            ContentKind::ObPost | ContentKind::Essay => ContentFacet::Text,
        }
    }

    /// Human-readable name and homepage of the hosting site.
    pub fn site_meta(&self) -> SiteMeta {
        match self {
            ContentKind::Youtube => SiteMeta {
                site_name: "YouTube",
                site_url: "https://www.youtube.com/",
            },
            ContentKind::Spotify => SiteMeta {
                site_name: "Spotify",
                site_url: "https://open.spotify.com/",
            },
            ContentKind::ObPost => SiteMeta {
                site_name: "Overcoming Bias",
                site_url: "https://www.overcomingbias.com/",
            },
            ContentKind::Essay => SiteMeta {
                site_name: "Robin Hanson",
                site_url: "https://mason.gmu.edu/~rhanson/",
            },
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(Self::Youtube),
            "spotify" => Ok(Self::Spotify),
            "ob_post" => Ok(Self::ObPost),
            "essay" => Ok(Self::Essay),
            _ => Err(format!("Invalid content kind: {}", s)),
        }
    }
}

// =============================================================================
// VARIANT PAYLOADS
// =============================================================================

/// Variant fields for a YouTube video.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YoutubePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_count: Option<i64>,
    pub channel_id: String,
    pub channel_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
    /// Raw plaintext description as returned by the API.
    #[serde(default)]
    pub description: String,
}

/// Variant fields for a Spotify podcast episode.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpotifyPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen_count: Option<i64>,
    pub show_id: String,
    pub show_title: String,
    /// Raw plaintext description as returned by the API.
    #[serde(default)]
    pub description: String,
}

/// Variant fields for an overcomingbias blog post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObPostPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<i32>,
    #[serde(default)]
    pub text_html: String,
    #[serde(default)]
    pub text_plain: String,
    /// Numeric post identifier, unique across posts.
    pub post_number: i32,
    /// Disqus API string identifier, unique across posts.
    pub disqus_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<i64>,
}

/// Variant fields for an archived essay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EssayPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<i32>,
    #[serde(default)]
    pub text_html: String,
    #[serde(default)]
    pub text_plain: String,
}

/// Kind-specific fields of a content item, stored as JSONB.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPayload {
    Youtube(YoutubePayload),
    Spotify(SpotifyPayload),
    ObPost(ObPostPayload),
    Essay(EssayPayload),
}

impl ContentPayload {
    pub fn kind(&self) -> ContentKind {
        match self {
            ContentPayload::Youtube(_) => ContentKind::Youtube,
            ContentPayload::Spotify(_) => ContentKind::Spotify,
            ContentPayload::ObPost(_) => ContentKind::ObPost,
            ContentPayload::Essay(_) => ContentKind::Essay,
        }
    }

    /// Serialize the variant fields for JSONB storage.
    pub fn to_value(&self) -> Result<JsonValue> {
        let value = match self {
            ContentPayload::Youtube(p) => serde_json::to_value(p)?,
            ContentPayload::Spotify(p) => serde_json::to_value(p)?,
            ContentPayload::ObPost(p) => serde_json::to_value(p)?,
            ContentPayload::Essay(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }

    /// Reconstruct the variant fields from a JSONB value of a known kind.
    pub fn from_value(kind: ContentKind, value: JsonValue) -> Result<Self> {
        let payload = match kind {
            ContentKind::Youtube => ContentPayload::Youtube(serde_json::from_value(value)?),
            ContentKind::Spotify => ContentPayload::Spotify(serde_json::from_value(value)?),
            ContentKind::ObPost => ContentPayload::ObPost(serde_json::from_value(value)?),
            ContentKind::Essay => ContentPayload::Essay(serde_json::from_value(value)?),
        };
        Ok(payload)
    }

    /// Build a payload for a freshly created item from a draft.
    ///
    /// Identity fields of the variant (channel, show, post number, Disqus id)
    /// must be present in the draft; text and counter fields default.
    pub fn from_draft(kind: ContentKind, draft: &ItemDraft) -> Result<Self> {
        fn required<T: Clone>(field: &Option<T>, name: &str, kind: ContentKind) -> Result<T> {
            field.clone().ok_or_else(|| {
                Error::InvalidInput(format!("Missing required field '{}' for {} item", name, kind))
            })
        }

        let payload = match kind {
            ContentKind::Youtube => ContentPayload::Youtube(YoutubePayload {
                duration_secs: draft.duration_secs,
                view_count: draft.view_count,
                channel_id: required(&draft.channel_id, "channel_id", kind)?,
                channel_title: required(&draft.channel_title, "channel_title", kind)?,
                likes: draft.likes,
                description: draft.description.clone().unwrap_or_default(),
            }),
            ContentKind::Spotify => ContentPayload::Spotify(SpotifyPayload {
                duration_secs: draft.duration_secs,
                listen_count: draft.listen_count,
                show_id: required(&draft.show_id, "show_id", kind)?,
                show_title: required(&draft.show_title, "show_title", kind)?,
                description: draft.description.clone().unwrap_or_default(),
            }),
            ContentKind::ObPost => ContentPayload::ObPost(ObPostPayload {
                word_count: draft.word_count,
                text_html: draft.text_html.clone().unwrap_or_default(),
                text_plain: draft.text_plain.clone().unwrap_or_default(),
                post_number: required(&draft.post_number, "post_number", kind)?,
                disqus_id: required(&draft.disqus_id, "disqus_id", kind)?,
                likes: draft.likes,
                comments: draft.comments,
            }),
            ContentKind::Essay => ContentPayload::Essay(EssayPayload {
                word_count: draft.word_count,
                text_html: draft.text_html.clone().unwrap_or_default(),
                text_plain: draft.text_plain.clone().unwrap_or_default(),
            }),
        };
        Ok(payload)
    }

    /// Overwrite payload fields from a draft, leaving absent fields untouched.
    pub fn apply_draft(&mut self, draft: &ItemDraft) {
        match self {
            ContentPayload::Youtube(p) => {
                if draft.duration_secs.is_some() {
                    p.duration_secs = draft.duration_secs;
                }
                if draft.view_count.is_some() {
                    p.view_count = draft.view_count;
                }
                if let Some(v) = &draft.channel_id {
                    p.channel_id = v.clone();
                }
                if let Some(v) = &draft.channel_title {
                    p.channel_title = v.clone();
                }
                if draft.likes.is_some() {
                    p.likes = draft.likes;
                }
                if let Some(v) = &draft.description {
                    p.description = v.clone();
                }
            }
            ContentPayload::Spotify(p) => {
                if draft.duration_secs.is_some() {
                    p.duration_secs = draft.duration_secs;
                }
                if draft.listen_count.is_some() {
                    p.listen_count = draft.listen_count;
                }
                if let Some(v) = &draft.show_id {
                    p.show_id = v.clone();
                }
                if let Some(v) = &draft.show_title {
                    p.show_title = v.clone();
                }
                if let Some(v) = &draft.description {
                    p.description = v.clone();
                }
            }
            ContentPayload::ObPost(p) => {
                if draft.word_count.is_some() {
                    p.word_count = draft.word_count;
                }
                if let Some(v) = &draft.text_html {
                    p.text_html = v.clone();
                }
                if let Some(v) = &draft.text_plain {
                    p.text_plain = v.clone();
                }
                if let Some(v) = draft.post_number {
                    p.post_number = v;
                }
                if let Some(v) = &draft.disqus_id {
                    p.disqus_id = v.clone();
                }
                if draft.likes.is_some() {
                    p.likes = draft.likes;
                }
                if draft.comments.is_some() {
                    p.comments = draft.comments;
                }
            }
            ContentPayload::Essay(p) => {
                if draft.word_count.is_some() {
                    p.word_count = draft.word_count;
                }
                if let Some(v) = &draft.text_html {
                    p.text_html = v.clone();
                }
                if let Some(v) = &draft.text_plain {
                    p.text_plain = v.clone();
                }
            }
        }
    }
}

// =============================================================================
// CONTENT ITEM
// =============================================================================

/// A unit of aggregated content (blog post, video, episode or essay).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub kind: ContentKind,

    /// Source-native identifier, unique within the kind.
    pub item_id: String,

    pub title: String,

    /// Absent for sources that do not expose one (essays).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<DateTime<Utc>>,

    pub description_html: String,

    /// When the item's data was last fetched from its source.
    pub download_timestamp: DateTime<Utc>,

    pub payload: ContentPayload,

    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl ContentItem {
    pub fn facet(&self) -> ContentFacet {
        self.kind.facet()
    }

    pub fn site_meta(&self) -> SiteMeta {
        self.kind.site_meta()
    }
}

// Serde for ContentPayload routes through (kind, value) so the JSONB column
// stays tag-free; this impl only exists so ContentItem can derive.
impl Serialize for ContentPayload {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Tagged<'a> {
            kind: ContentKind,
            fields: &'a JsonValue,
        }
        let fields = self.to_value().map_err(serde::ser::Error::custom)?;
        Tagged {
            kind: self.kind(),
            fields: &fields,
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ContentPayload {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Tagged {
            kind: ContentKind,
            fields: JsonValue,
        }
        let tagged = Tagged::deserialize(deserializer)?;
        ContentPayload::from_value(tagged.kind, tagged.fields).map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// LINKS
// =============================================================================

/// A URL referenced by one or more content items.
///
/// URLs are globally unique and shared; internalization replaces an item's
/// reference to an external link with a direct reference to the stored item
/// the URL resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalLink {
    pub id: Uuid,
    pub url: String,
}

// =============================================================================
// ITEM DRAFT
// =============================================================================

/// Uniform attribute record produced by the tidy layer.
///
/// Scalar fields are `Option` with "absent = leave untouched" semantics on
/// update; the three relationship lists use replace semantics when present.
/// A single flat record covers every kind; fields a kind does not use are
/// simply never set by its tidier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDraft {
    // Base fields
    pub item_id: Option<String>,
    pub title: Option<String>,
    pub description_html: Option<String>,
    pub publish_date: Option<DateTime<Utc>>,
    pub edit_date: Option<DateTime<Utc>>,
    pub download_timestamp: Option<DateTime<Utc>>,

    // Media fields
    pub duration_secs: Option<i64>,
    pub view_count: Option<i64>,
    pub listen_count: Option<i64>,
    pub likes: Option<i64>,
    pub comments: Option<i64>,

    // YouTube fields
    pub channel_id: Option<String>,
    pub channel_title: Option<String>,

    // Spotify fields
    pub show_id: Option<String>,
    pub show_title: Option<String>,

    // Shared plaintext description (YouTube, Spotify)
    pub description: Option<String>,

    // Text fields (blog posts, essays)
    pub word_count: Option<i32>,
    pub text_html: Option<String>,
    pub text_plain: Option<String>,
    pub post_number: Option<i32>,
    pub disqus_id: Option<String>,

    // Relationships (replace semantics when present)
    pub author_names: Option<Vec<String>>,
    pub classifier_names: Option<Vec<String>>,
    pub link_urls: Option<Vec<String>>,
}

impl ItemDraft {
    /// Unset an attribute by name. Returns false for unknown names.
    ///
    /// Used by the update pipeline to honor excluded attributes.
    pub fn clear_attr(&mut self, attr: &str) -> bool {
        match attr {
            "item_id" => self.item_id = None,
            "title" => self.title = None,
            "description_html" => self.description_html = None,
            "publish_date" => self.publish_date = None,
            "edit_date" => self.edit_date = None,
            "download_timestamp" => self.download_timestamp = None,
            "duration_secs" => self.duration_secs = None,
            "view_count" => self.view_count = None,
            "listen_count" => self.listen_count = None,
            "likes" => self.likes = None,
            "comments" => self.comments = None,
            "channel_id" => self.channel_id = None,
            "channel_title" => self.channel_title = None,
            "show_id" => self.show_id = None,
            "show_title" => self.show_title = None,
            "description" => self.description = None,
            "word_count" => self.word_count = None,
            "text_html" => self.text_html = None,
            "text_plain" => self.text_plain = None,
            "post_number" => self.post_number = None,
            "disqus_id" => self.disqus_id = None,
            "author_names" => self.author_names = None,
            "classifier_names" => self.classifier_names = None,
            "link_urls" => self.link_urls = None,
            _ => return false,
        }
        true
    }
}
