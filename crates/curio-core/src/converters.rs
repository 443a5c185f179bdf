//! URL ⇄ item-id converters for every content source.
//!
//! Each source has a canonical URL shape; a [`UrlConverter`] extracts the
//! source-native id from a URL and rebuilds the canonical URL from an id.
//! [`ConverterRegistry`] holds converters in a fixed consultation order so
//! link internalization and `find_by_url` resolve deterministically.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::content::ContentKind;
use crate::error::{Error, Result};

/// Id of a YouTube video: 10 base64-ish chars and a constrained final char.
pub const YOUTUBE_VIDEO_ID: &str = "[0-9A-Za-z_-]{10}[048AEIMQUYcgkosw]";

/// Id of a Spotify episode: 22 alphanumeric chars.
pub const SPOTIFY_EPISODE_ID: &str = "[a-zA-Z0-9]{22}";

/// Name of an overcomingbias post, e.g. "2006/11/introduction".
pub const OB_POST_NAME: &str = r"\d{4}/\d{2}/[a-z0-9_%-]+";

/// Five-digit overcomingbias post number.
pub const OB_POST_NUMBER: &str = "[0-9]{5}";

/// String id of an archived essay, e.g. "Varytax".
pub const ESSAY_ID: &str = "[A-Za-z0-9_%-]+";

// Video URL shapes cover watch links, embeds, shortlinks and nocookie hosts.
static YOUTUBE_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:(?:https?:)?//)?(?:(?:www|m)\.)?(?:youtube(?:-nocookie)?\.com|youtu\.be)/(?:[\w\-]+\?v=|embed/|v/)?({})\S*",
        YOUTUBE_VIDEO_ID
    ))
    .expect("youtube url regex is valid")
});

static SPOTIFY_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:(?:https?:)?//)?open\.spotify\.com/episode/({})\S*",
        SPOTIFY_EPISODE_ID
    ))
    .expect("spotify url regex is valid")
});

static OB_LONG_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:https?://)?(?:www\.)?overcomingbias\.com/({})\.html?",
        OB_POST_NAME
    ))
    .expect("ob long url regex is valid")
});

static OB_SHORT_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:https?://)?(?:www\.)?overcomingbias\.com/\?p=({})",
        OB_POST_NUMBER
    ))
    .expect("ob short url regex is valid")
});

static ESSAY_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:https?://)?mason\.gmu\.edu/~rhanson/({})\.html?",
        ESSAY_ID
    ))
    .expect("essay url regex is valid")
});

/// Converts between one URL shape and the id embedded in it.
#[derive(Debug, Clone)]
pub struct UrlConverter {
    pattern: Regex,
    template: &'static str,
}

impl UrlConverter {
    /// Extract the id from the first match of the pattern in `url`.
    pub fn to_id(&self, url: &str) -> Option<String> {
        self.pattern
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// Build the canonical URL for an id.
    pub fn to_url(&self, id: &str) -> String {
        self.template.replacen("{}", id, 1)
    }

    pub fn youtube() -> Self {
        Self {
            pattern: YOUTUBE_URL_RE.clone(),
            template: "https://www.youtube.com/watch?v={}",
        }
    }

    pub fn spotify() -> Self {
        Self {
            pattern: SPOTIFY_URL_RE.clone(),
            template: "https://open.spotify.com/episode/{}",
        }
    }

    pub fn ob_long() -> Self {
        Self {
            pattern: OB_LONG_URL_RE.clone(),
            template: "https://www.overcomingbias.com/{}.html",
        }
    }

    pub fn ob_short() -> Self {
        Self {
            pattern: OB_SHORT_URL_RE.clone(),
            template: "https://www.overcomingbias.com/?p={}",
        }
    }

    pub fn essay() -> Self {
        Self {
            pattern: ESSAY_URL_RE.clone(),
            template: "https://mason.gmu.edu/~rhanson/{}.html",
        }
    }
}

/// How a converter's captured value identifies a stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdScheme {
    /// The captured value is the item's source-native `item_id`.
    ItemId,
    /// The captured value is a blog post number.
    PostNumber,
}

/// A successful URL resolution: which kind matched and what the capture was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlMatch {
    pub kind: ContentKind,
    pub scheme: IdScheme,
    pub value: String,
}

struct RegistryEntry {
    kind: ContentKind,
    scheme: IdScheme,
    converter: UrlConverter,
}

/// Ordered collection of converters, consulted first-match-wins.
pub struct ConverterRegistry {
    entries: Vec<RegistryEntry>,
}

impl ConverterRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// The standard registry: YouTube, Spotify, blog long URL, blog short
    /// URL, essay. Resolution order is fixed.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(ContentKind::Youtube, IdScheme::ItemId, UrlConverter::youtube());
        registry.register(ContentKind::Spotify, IdScheme::ItemId, UrlConverter::spotify());
        registry.register(ContentKind::ObPost, IdScheme::ItemId, UrlConverter::ob_long());
        registry.register(
            ContentKind::ObPost,
            IdScheme::PostNumber,
            UrlConverter::ob_short(),
        );
        registry.register(ContentKind::Essay, IdScheme::ItemId, UrlConverter::essay());
        registry
    }

    /// Append a converter. Resolution follows registration order.
    pub fn register(&mut self, kind: ContentKind, scheme: IdScheme, converter: UrlConverter) {
        self.entries.push(RegistryEntry {
            kind,
            scheme,
            converter,
        });
    }

    /// Resolve a URL to the first matching converter's kind and capture.
    pub fn resolve(&self, url: &str) -> Option<UrlMatch> {
        self.entries.iter().find_map(|entry| {
            entry.converter.to_id(url).map(|value| UrlMatch {
                kind: entry.kind,
                scheme: entry.scheme,
                value,
            })
        })
    }

    /// Canonical URL of an item, via the kind's primary (item-id) converter.
    pub fn content_url(&self, kind: ContentKind, item_id: &str) -> Result<String> {
        self.entries
            .iter()
            .find(|entry| entry.kind == kind && entry.scheme == IdScheme::ItemId)
            .map(|entry| entry.converter.to_url(item_id))
            .ok_or_else(|| Error::Internal(format!("No URL converter registered for kind: {}", kind)))
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
