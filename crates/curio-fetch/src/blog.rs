//! Overcomingbias scraper-service source.
//!
//! Talks to the post-scraping service over HTTP: `/posts?names=...` returns
//! a name-to-post JSON object (`null` for names the site does not know) and
//! `/edit-dates` returns the full name-to-timestamp index used by the sync
//! controller.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use curio_core::{
    ContentKind, ContentSource, EditIndexFetcher, Error, ItemDraft, RawBatch, RawFetcher, Result,
};

/// Default base URL of the scraper service.
pub const DEFAULT_BLOG_BASE_URL: &str = curio_core::defaults::BLOG_BASE_URL;

static DUP_HYPHEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+").expect("hyphen regex is valid"));

static HYPHEN_EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-(\.html?)").expect("extension regex is valid"));

static HTM_EXT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.htm\b").expect("htm regex is valid"));

/// Blog scraper-service source.
pub struct BlogSource {
    client: Client,
    base_url: String,
}

impl BlogSource {
    /// Create a source against the default service endpoint.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BLOG_BASE_URL)
    }

    /// Create a source against a custom endpoint (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(curio_core::defaults::FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables, falling back to the default
    /// service endpoint.
    pub fn from_env() -> Self {
        let base_url = std::env::var(curio_core::defaults::ENV_BLOG_BASE_URL)
            .unwrap_or_else(|_| DEFAULT_BLOG_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }
}

impl Default for BlogSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RawFetcher for BlogSource {
    fn kind(&self) -> ContentKind {
        ContentKind::ObPost
    }

    #[instrument(skip(self, ids), fields(subsystem = "fetch", component = "blog", op = "fetch_batch", input_count = ids.len()))]
    async fn fetch_batch(&self, ids: &[String]) -> Result<RawBatch> {
        if ids.is_empty() {
            return Ok(RawBatch::Json(serde_json::json!({})));
        }

        let response = self
            .client
            .get(format!("{}/posts", self.base_url))
            .query(&[("names", ids.join(",").as_str())])
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Blog scraper request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "Blog scraper returned {}: {}",
                status, body
            )));
        }

        let payload: JsonValue = response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to parse blog scraper response: {}", e)))?;

        Ok(RawBatch::Json(payload))
    }
}

impl ContentSource for BlogSource {
    fn tidy(&self, ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
        tidy_blog(ids, raw)
    }
}

#[async_trait]
impl EditIndexFetcher for BlogSource {
    #[instrument(skip(self), fields(subsystem = "fetch", component = "blog", op = "fetch_index"))]
    async fn fetch_index(&self) -> Result<BTreeMap<String, DateTime<Utc>>> {
        let response = self
            .client
            .get(format!("{}/edit-dates", self.base_url))
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("Edit-date index request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Fetch(format!(
                "Edit-date index returned {}: {}",
                status, body
            )));
        }

        let index: BTreeMap<String, DateTime<Utc>> = response
            .json()
            .await
            .map_err(|e| Error::Fetch(format!("Failed to parse edit-date index: {}", e)))?;

        debug!(result_count = index.len(), "Fetched edit-date index");
        Ok(index)
    }
}

/// Tidy a raw name-to-post batch into drafts positionally aligned with `ids`.
pub fn tidy_blog(ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
    let payload = raw.as_json()?;
    let posts = payload
        .as_object()
        .ok_or_else(|| Error::Serialization("Blog payload is not a name-to-post object".into()))?;

    ids.iter()
        .map(|name| match posts.get(name) {
            Some(value) if !value.is_null() => tidy_post(value).map(Some),
            _ => Ok(None),
        })
        .collect()
}

fn tidy_post(value: &JsonValue) -> Result<ItemDraft> {
    let post: PostResource = serde_json::from_value(value.clone())?;

    let mut link_urls: Vec<String> = post
        .internal_links
        .iter()
        .map(|url| clean_link_url(url))
        .collect();
    link_urls.extend(post.external_links);

    Ok(ItemDraft {
        item_id: Some(post.name),
        title: Some(post.title),
        publish_date: Some(post.publish_date),
        edit_date: post.edit_date,
        word_count: Some(post.word_count),
        text_html: Some(post.text_html),
        text_plain: Some(post.plaintext),
        post_number: Some(post.number),
        disqus_id: Some(post.disqus_id),
        likes: post.votes,
        comments: post.comments,
        author_names: Some(vec![post.author]),
        classifier_names: Some([post.tags, post.categories].concat()),
        link_urls: Some(link_urls),
        ..ItemDraft::default()
    })
}

/// Fix common errors in scraped internal links: stray whitespace, duplicate
/// hyphens, a leftover hyphen before the extension, and a bare `.htm`
/// extension.
pub fn clean_link_url(url: &str) -> String {
    let trimmed = url.trim();
    let collapsed = DUP_HYPHEN_RE.replace_all(trimmed, "-");
    let dehyphenated = HYPHEN_EXT_RE.replace_all(&collapsed, "$1");
    HTM_EXT_RE.replace_all(&dehyphenated, ".html").into_owned()
}

/// Post object from the scraper service.
#[derive(Debug, Deserialize)]
struct PostResource {
    name: String,
    number: i32,
    title: String,
    author: String,
    publish_date: DateTime<Utc>,
    #[serde(default)]
    edit_date: Option<DateTime<Utc>>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    text_html: String,
    #[serde(default)]
    plaintext: String,
    word_count: i32,
    #[serde(default)]
    internal_links: Vec<String>,
    #[serde(default)]
    external_links: Vec<String>,
    disqus_id: String,
    #[serde(default)]
    votes: Option<i64>,
    #[serde(default)]
    comments: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn signaling_post() -> JsonValue {
        json!({
            "name": "2009/03/signaling-in-economics",
            "number": 16642,
            "title": "Signaling in Economics",
            "author": "Robin Hanson",
            "publish_date": "2009-03-21T22:00:00Z",
            "edit_date": "2009-03-22T08:15:00Z",
            "tags": ["signaling"],
            "categories": ["economics"],
            "text_html": "<p>Arnold Kling cites this definition of signaling.</p>",
            "plaintext": "Arnold Kling cites this definition of signaling.",
            "word_count": 8,
            "internal_links": [
                " https://www.overcomingbias.com/2007/01/treacherous--paths-.html"
            ],
            "external_links": ["http://econlog.econlib.org/archives/2009/03/signaling.html"],
            "disqus_id": "16642 https://www.overcomingbias.com/?p=16642",
            "votes": 12,
            "comments": 31
        })
    }

    #[test]
    fn tidy_maps_post_fields() {
        let ids = vec!["2009/03/signaling-in-economics".to_string()];
        let raw = RawBatch::Json(json!({ "2009/03/signaling-in-economics": signaling_post() }));

        let drafts = tidy_blog(&ids, &raw).expect("tidy failed");
        let draft = drafts[0].as_ref().expect("draft missing");

        assert_eq!(draft.title.as_deref(), Some("Signaling in Economics"));
        assert_eq!(draft.post_number, Some(16642));
        assert_eq!(
            draft.publish_date,
            Some(Utc.with_ymd_and_hms(2009, 3, 21, 22, 0, 0).unwrap())
        );
        assert_eq!(draft.likes, Some(12));
        assert_eq!(draft.comments, Some(31));
        assert!(draft
            .text_plain
            .as_deref()
            .is_some_and(|t| t.starts_with("Arnold Kling cites this")));
        assert_eq!(
            draft.author_names.as_deref(),
            Some(&["Robin Hanson".to_string()][..])
        );
        assert_eq!(
            draft.classifier_names.as_deref(),
            Some(&["signaling".to_string(), "economics".to_string()][..])
        );
    }

    #[test]
    fn tidy_cleans_internal_links_and_keeps_external() {
        let ids = vec!["2009/03/signaling-in-economics".to_string()];
        let raw = RawBatch::Json(json!({ "2009/03/signaling-in-economics": signaling_post() }));

        let drafts = tidy_blog(&ids, &raw).expect("tidy failed");
        let links = drafts[0]
            .as_ref()
            .and_then(|d| d.link_urls.as_deref())
            .expect("links missing");

        assert_eq!(
            links,
            &[
                "https://www.overcomingbias.com/2007/01/treacherous-paths.html".to_string(),
                "http://econlog.econlib.org/archives/2009/03/signaling.html".to_string(),
            ]
        );
    }

    #[test]
    fn tidy_aligns_unknown_names_as_none() {
        let ids = vec![
            "2999/01/not-a-post".to_string(),
            "2009/03/signaling-in-economics".to_string(),
        ];
        let raw = RawBatch::Json(json!({
            "2999/01/not-a-post": null,
            "2009/03/signaling-in-economics": signaling_post()
        }));

        let drafts = tidy_blog(&ids, &raw).expect("tidy failed");
        assert!(drafts[0].is_none());
        assert!(drafts[1].is_some());
    }

    #[test]
    fn clean_link_url_fixes_scrape_artifacts() {
        assert_eq!(
            clean_link_url(" https://www.overcomingbias.com/2006/11/test.html\n"),
            "https://www.overcomingbias.com/2006/11/test.html"
        );
        assert_eq!(
            clean_link_url("https://www.overcomingbias.com/2006/11/two--words.html"),
            "https://www.overcomingbias.com/2006/11/two-words.html"
        );
        assert_eq!(
            clean_link_url("https://www.overcomingbias.com/2006/11/test-.html"),
            "https://www.overcomingbias.com/2006/11/test.html"
        );
        assert_eq!(
            clean_link_url("https://www.overcomingbias.com/2006/11/test.htm"),
            "https://www.overcomingbias.com/2006/11/test.html"
        );
        // Already-clean URLs pass through unchanged.
        assert_eq!(
            clean_link_url("https://www.overcomingbias.com/2006/11/test.html"),
            "https://www.overcomingbias.com/2006/11/test.html"
        );
    }

    #[test]
    fn clean_link_url_handles_stacked_artifacts() {
        assert_eq!(
            clean_link_url("  https://www.overcomingbias.com/2007/01/treacherous--paths-.htm "),
            "https://www.overcomingbias.com/2007/01/treacherous-paths.html"
        );
    }
}
