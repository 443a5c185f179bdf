//! Static essay-archive source.
//!
//! The archive is a plain directory of HTML pages, one per essay id, so a
//! batch is fetched page by page. A 404 is the archive's only "unknown id"
//! signal and becomes a per-id `None`; every other failure aborts the batch.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use curio_core::text::{html_to_plaintext, word_count};
use curio_core::{ContentKind, ContentSource, Error, ItemDraft, RawBatch, RawFetcher, Result};

/// Default base URL of the essay archive.
pub const DEFAULT_ESSAY_BASE_URL: &str = curio_core::defaults::ESSAY_BASE_URL;

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex is valid"));

static H1_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<h1[^>]*>(.*?)</h1>").expect("h1 regex is valid"));

/// Essay archive source.
pub struct EssaySource {
    client: Client,
    base_url: String,
}

impl EssaySource {
    /// Create a source against the default archive.
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_ESSAY_BASE_URL)
    }

    /// Create a source against a custom archive root (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        // The archive host rejects clients without a browser user agent.
        let client = Client::builder()
            .user_agent(curio_core::defaults::ESSAY_USER_AGENT)
            .timeout(Duration::from_secs(curio_core::defaults::FETCH_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables, falling back to the default
    /// archive.
    pub fn from_env() -> Self {
        let base_url = std::env::var(curio_core::defaults::ENV_ESSAY_BASE_URL)
            .unwrap_or_else(|_| DEFAULT_ESSAY_BASE_URL.to_string());
        Self::with_base_url(base_url)
    }
}

impl Default for EssaySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RawFetcher for EssaySource {
    fn kind(&self) -> ContentKind {
        ContentKind::Essay
    }

    #[instrument(skip(self, ids), fields(subsystem = "fetch", component = "essays", op = "fetch_batch", input_count = ids.len()))]
    async fn fetch_batch(&self, ids: &[String]) -> Result<RawBatch> {
        let mut pages = BTreeMap::new();

        for id in ids {
            let url = format!("{}/{}.html", self.base_url, id);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| Error::Fetch(format!("Essay request failed: {}", e)))?;

            if response.status() == StatusCode::NOT_FOUND {
                debug!(item_id = %id, "Essay not found in archive");
                pages.insert(id.clone(), None);
                continue;
            }
            if !response.status().is_success() {
                return Err(Error::Fetch(format!(
                    "Essay archive returned {} for '{}'",
                    response.status(),
                    id
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|e| Error::Fetch(format!("Failed to read essay '{}': {}", id, e)))?;
            pages.insert(id.clone(), Some(body));
        }

        Ok(RawBatch::Pages(pages))
    }
}

impl ContentSource for EssaySource {
    fn tidy(&self, ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
        tidy_essays(ids, raw)
    }
}

/// Tidy a raw page batch into drafts positionally aligned with `ids`.
pub fn tidy_essays(ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
    let pages = raw.as_pages()?;

    Ok(ids
        .iter()
        .map(|id| {
            pages
                .get(id)
                .and_then(|page| page.as_deref())
                .map(|html| tidy_essay(id, html))
        })
        .collect())
}

fn tidy_essay(id: &str, html: &str) -> ItemDraft {
    let text_plain = html_to_plaintext(html);

    ItemDraft {
        item_id: Some(id.to_string()),
        // Untitled pages fall back to their archive id.
        title: Some(extract_title(html).unwrap_or_else(|| id.to_string())),
        word_count: Some(word_count(&text_plain)),
        text_html: Some(html.to_string()),
        text_plain: Some(text_plain),
        author_names: Some(vec![curio_core::defaults::ESSAY_AUTHOR.to_string()]),
        ..ItemDraft::default()
    }
}

/// Page title from `<title>`, falling back to the first `<h1>`.
fn extract_title(html: &str) -> Option<String> {
    for re in [&*TITLE_RE, &*H1_RE] {
        if let Some(caps) = re.captures(html) {
            let text = html_to_plaintext(&caps[1]);
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}
