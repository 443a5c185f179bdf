//! Traits implemented by the fetch collaborators.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::content::{ContentKind, ItemDraft};
use crate::error::{Error, Result};

/// Provider-native response for a batch of source ids.
#[derive(Debug, Clone, PartialEq)]
pub enum RawBatch {
    /// A JSON document (YouTube, Spotify and blog scraper responses).
    Json(JsonValue),
    /// Raw HTML keyed by id; `None` marks ids the provider does not know.
    Pages(BTreeMap<String, Option<String>>),
}

impl RawBatch {
    pub fn as_json(&self) -> Result<&JsonValue> {
        match self {
            RawBatch::Json(value) => Ok(value),
            RawBatch::Pages(_) => Err(Error::Internal(
                "Expected a JSON batch, got HTML pages".into(),
            )),
        }
    }

    pub fn as_pages(&self) -> Result<&BTreeMap<String, Option<String>>> {
        match self {
            RawBatch::Pages(pages) => Ok(pages),
            RawBatch::Json(_) => Err(Error::Internal(
                "Expected an HTML page batch, got JSON".into(),
            )),
        }
    }
}

/// Downloads provider-native data for a batch of source ids.
#[async_trait]
pub trait RawFetcher: Send + Sync {
    /// The content kind this fetcher serves.
    fn kind(&self) -> ContentKind;

    /// Fetch raw data for `ids`.
    ///
    /// Transport, auth and rate-limit failures surface as `Error::Fetch`.
    /// Ids the provider does not know must appear as per-id nulls in the
    /// payload, never as errors.
    async fn fetch_batch(&self, ids: &[String]) -> Result<RawBatch>;
}

/// A fetcher that can also normalize its raw data into item drafts.
pub trait ContentSource: RawFetcher {
    /// Normalize a raw batch into drafts positionally aligned with `ids`.
    ///
    /// Unknown ids yield `None` at their position.
    fn tidy(&self, ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>>;
}

impl<'a> std::fmt::Debug for dyn ContentSource + 'a {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentSource")
            .field("kind", &self.kind())
            .finish_non_exhaustive()
    }
}

/// Fetches the blog's full name → edit-date index.
#[async_trait]
pub trait EditIndexFetcher: Send + Sync {
    async fn fetch_index(&self) -> Result<BTreeMap<String, DateTime<Utc>>>;
}
