//! Incremental sync between the blog source and the local store.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use curio_core::{ContentItem, ContentKind, ContentRepository, Result};
use curio_db::Database;
use curio_fetch::SourceRegistry;

use crate::pipeline::{create_items, update_items};

/// Drives incremental download and update runs for the blog source.
///
/// Both entry points are idempotent under at-least-once execution: a rerun
/// after a partial failure picks up where the committed batches stopped.
pub struct SyncController {
    db: Database,
    sources: SourceRegistry,
    batch_size: usize,
}

impl SyncController {
    /// Create a controller. The batch size usually comes from
    /// [`curio_core::SyncConfig`] at the composition root.
    pub fn new(db: Database, sources: SourceRegistry, batch_size: usize) -> Self {
        Self {
            db,
            sources,
            // chunks() panics on zero
            batch_size: batch_size.max(1),
        }
    }

    /// Pull the full remote edit-date index and refresh local edit dates
    /// without bumping `updated_at_utc`. Returns the number of rows touched.
    #[instrument(skip(self), fields(subsystem = "sync", component = "controller", op = "refresh_edit_dates"))]
    pub async fn refresh_edit_dates(&self) -> Result<u64> {
        let (_, refreshed) = self.refresh_index().await?;
        Ok(refreshed)
    }

    async fn refresh_index(&self) -> Result<(BTreeMap<String, DateTime<Utc>>, u64)> {
        let index = self.sources.edit_index()?.fetch_index().await?;
        let refreshed = self
            .db
            .content
            .refresh_edit_dates(ContentKind::ObPost, &index)
            .await?;

        debug!(
            subsystem = "sync",
            component = "controller",
            index_len = index.len(),
            refreshed,
            "Refreshed edit dates from remote index"
        );

        Ok((index, refreshed))
    }

    /// Download blog posts that are present in the remote index but not in
    /// the store, returning the created items.
    ///
    /// The cutoff is the newest edit date among stored posts never edited
    /// after creation; index entries at or below it are already stored.
    /// Names are created oldest first, so an interrupted run resumes where
    /// it stopped.
    #[instrument(skip(self), fields(subsystem = "sync", component = "controller", op = "download_new_items"))]
    pub async fn download_new_items(&self) -> Result<Vec<ContentItem>> {
        let (index, _) = self.refresh_index().await?;

        let min_edit_date = self
            .db
            .content
            .latest_unedited_edit_date(ContentKind::ObPost)
            .await?;

        let mut entries: Vec<(&String, &DateTime<Utc>)> = index.iter().collect();
        entries.sort_by(|a, b| a.1.cmp(b.1).then_with(|| a.0.cmp(b.0)));

        let stored: HashSet<String> = self
            .db
            .content
            .item_ids_of_kind(ContentKind::ObPost)
            .await?
            .into_iter()
            .collect();

        let new_names: Vec<String> = entries
            .into_iter()
            .filter(|(_, date)| min_edit_date.map_or(true, |min| **date > min))
            .filter(|(name, _)| !stored.contains(*name))
            .map(|(name, _)| name.clone())
            .collect();

        info!(
            subsystem = "sync",
            component = "controller",
            candidates = new_names.len(),
            ?min_edit_date,
            "Downloading new blog posts"
        );

        let mut created = Vec::new();
        for chunk in new_names.chunks(self.batch_size) {
            let items = create_items(&self.db, &self.sources, ContentKind::ObPost, chunk).await?;
            created.extend(items.into_iter().flatten());
        }

        info!(
            subsystem = "sync",
            component = "controller",
            created = created.len(),
            "Downloaded new blog posts"
        );

        Ok(created)
    }

    /// Re-download blog posts edited upstream since their last download.
    ///
    /// Returns each selected item with a flag telling whether a fresh draft
    /// was applied.
    #[instrument(skip(self), fields(subsystem = "sync", component = "controller", op = "update_edited_items"))]
    pub async fn update_edited_items(&self) -> Result<Vec<(ContentItem, bool)>> {
        self.refresh_index().await?;

        let edited = self
            .db
            .content
            .list_edited_after_download(ContentKind::ObPost)
            .await?;

        info!(
            subsystem = "sync",
            component = "controller",
            edited = edited.len(),
            "Updating edited blog posts"
        );

        let results =
            update_items(&self.db, &self.sources, ContentKind::ObPost, edited, &[]).await?;

        info!(
            subsystem = "sync",
            component = "controller",
            updated = results.iter().filter(|(_, updated)| *updated).count(),
            "Updated edited blog posts"
        );

        Ok(results)
    }
}
