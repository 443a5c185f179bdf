//! Mock content source for deterministic testing.
//!
//! Serves pre-configured drafts through the real [`RawBatch`] plumbing, so
//! the fetch and tidy halves are exercised the same way as a live source.
//! Failure injection is deterministic per id, with an optional random
//! failure rate for error-path tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use curio_fetch::mock::MockSource;
//!
//! let source = MockSource::new(ContentKind::ObPost)
//!     .with_draft("2009/03/signaling-in-economics", draft)
//!     .with_edit_date("2009/03/signaling-in-economics", edit_date);
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use curio_core::{
    ContentKind, ContentSource, EditIndexFetcher, Error, ItemDraft, RawBatch, RawFetcher, Result,
};

/// Mock content source for testing.
#[derive(Clone)]
pub struct MockSource {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    kind: ContentKind,
    drafts: HashMap<String, ItemDraft>,
    edit_dates: BTreeMap<String, DateTime<Utc>>,
    failing_ids: HashSet<String>,
    failure_rate: f64,
    latency_ms: u64,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
    pub timestamp: std::time::Instant,
}

impl MockSource {
    /// Create a mock source for a content kind with no known ids.
    pub fn new(kind: ContentKind) -> Self {
        Self {
            config: Arc::new(MockConfig {
                kind,
                drafts: HashMap::new(),
                edit_dates: BTreeMap::new(),
                failing_ids: HashSet::new(),
                failure_rate: 0.0,
                latency_ms: 0,
            }),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a draft served for an id.
    pub fn with_draft(mut self, id: impl Into<String>, draft: ItemDraft) -> Self {
        Arc::make_mut(&mut self.config).drafts.insert(id.into(), draft);
        self
    }

    /// Register an entry in the edit-date index.
    pub fn with_edit_date(mut self, name: impl Into<String>, date: DateTime<Utc>) -> Self {
        Arc::make_mut(&mut self.config)
            .edit_dates
            .insert(name.into(), date);
        self
    }

    /// Make any batch containing `id` fail with `Error::Fetch`.
    pub fn with_failing_id(mut self, id: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).failing_ids.insert(id.into());
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    /// Number of `fetch_batch` calls so far.
    pub fn fetch_call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == "fetch_batch")
            .count()
    }

    /// Number of `fetch_index` calls so far.
    pub fn index_call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == "fetch_index")
            .count()
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
            timestamp: std::time::Instant::now(),
        });
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        if self.config.failure_rate > 0.0 {
            rand::thread_rng().gen::<f64>() < self.config.failure_rate
        } else {
            false
        }
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

#[async_trait]
impl RawFetcher for MockSource {
    fn kind(&self) -> ContentKind {
        self.config.kind
    }

    async fn fetch_batch(&self, ids: &[String]) -> Result<RawBatch> {
        self.log_call("fetch_batch", &ids.join(","));
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(Error::Fetch("Simulated fetch failure".into()));
        }
        if let Some(id) = ids.iter().find(|id| self.config.failing_ids.contains(*id)) {
            return Err(Error::Fetch(format!("Simulated fetch failure for '{}'", id)));
        }

        let batch: BTreeMap<&str, Option<&ItemDraft>> = ids
            .iter()
            .map(|id| (id.as_str(), self.config.drafts.get(id)))
            .collect();
        Ok(RawBatch::Json(serde_json::to_value(batch)?))
    }
}

impl ContentSource for MockSource {
    fn tidy(&self, ids: &[String], raw: &RawBatch) -> Result<Vec<Option<ItemDraft>>> {
        self.log_call("tidy", &ids.join(","));

        let batch: BTreeMap<String, Option<ItemDraft>> =
            serde_json::from_value(raw.as_json()?.clone())?;
        Ok(ids
            .iter()
            .map(|id| batch.get(id).cloned().flatten())
            .collect())
    }
}

#[async_trait]
impl EditIndexFetcher for MockSource {
    async fn fetch_index(&self) -> Result<BTreeMap<String, DateTime<Utc>>> {
        self.log_call("fetch_index", "");
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(Error::Fetch("Simulated fetch failure".into()));
        }
        Ok(self.config.edit_dates.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(title: &str) -> ItemDraft {
        ItemDraft {
            item_id: Some("2009/03/signaling-in-economics".to_string()),
            title: Some(title.to_string()),
            post_number: Some(16642),
            ..ItemDraft::default()
        }
    }

    #[tokio::test]
    async fn fetch_and_tidy_round_trip_drafts() {
        let source = MockSource::new(ContentKind::ObPost)
            .with_draft("2009/03/signaling-in-economics", draft("Signaling in Economics"));

        let ids = vec![
            "2009/03/signaling-in-economics".to_string(),
            "2999/01/not-a-post".to_string(),
        ];
        let raw = source.fetch_batch(&ids).await.unwrap();
        let drafts = source.tidy(&ids, &raw).unwrap();

        assert_eq!(
            drafts[0].as_ref().and_then(|d| d.title.as_deref()),
            Some("Signaling in Economics")
        );
        assert!(drafts[1].is_none());
    }

    #[tokio::test]
    async fn failing_id_fails_the_whole_batch() {
        let source = MockSource::new(ContentKind::ObPost)
            .with_draft("a", draft("A"))
            .with_failing_id("b");

        let result = source
            .fetch_batch(&["a".to_string(), "b".to_string()])
            .await;
        assert!(matches!(result, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn failure_rate_simulation() {
        let source = MockSource::new(ContentKind::Youtube).with_failure_rate(1.0);
        assert!(source.fetch_batch(&["x".to_string()]).await.is_err());
    }

    #[tokio::test]
    async fn call_logging_counts_operations() {
        let source = MockSource::new(ContentKind::ObPost)
            .with_edit_date("2009/03/signaling-in-economics", Utc::now());

        source.fetch_batch(&["a".to_string()]).await.unwrap();
        source.fetch_batch(&["b".to_string()]).await.unwrap();
        source.fetch_index().await.unwrap();

        assert_eq!(source.fetch_call_count(), 2);
        assert_eq!(source.index_call_count(), 1);
        assert_eq!(source.get_calls().len(), 3);

        source.clear_calls();
        assert!(source.get_calls().is_empty());
    }
}
