//! Content upsert pipeline: assemble drafts and store them.

use tracing::{debug, instrument};

use curio_core::{ContentItem, ContentKind, ContentRepository, Error, ItemDraft, Result};
use curio_db::Database;
use curio_fetch::SourceRegistry;

use crate::assemble::assemble_items;

/// Fetch, tidy and store a batch of items, returning stored rows
/// positionally aligned with `item_ids`. Ids unknown to the provider yield
/// `None`.
#[instrument(skip(db, sources, item_ids), fields(subsystem = "sync", component = "pipeline", op = "create_items", input_count = item_ids.len()))]
pub async fn create_items(
    db: &Database,
    sources: &SourceRegistry,
    kind: ContentKind,
    item_ids: &[String],
) -> Result<Vec<Option<ContentItem>>> {
    let drafts = assemble_items(sources, kind, item_ids).await?;

    let mut items = Vec::with_capacity(drafts.len());
    for draft in &drafts {
        match draft {
            Some(draft) => {
                let item = db.content.save_item(kind, None, draft).await?;
                items.push(Some(item));
            }
            None => items.push(None),
        }
    }

    debug!(
        subsystem = "sync",
        component = "pipeline",
        kind = %kind,
        created = items.iter().filter(|i| i.is_some()).count(),
        "Created content items"
    );

    Ok(items)
}

/// Create items in fixed-size batches, returning the number stored.
///
/// A failing batch propagates its error; batches committed before it stay
/// in place, so re-running the same id list resumes past them.
#[instrument(skip(db, sources, item_ids), fields(subsystem = "sync", component = "pipeline", op = "bulk_create_items", input_count = item_ids.len()))]
pub async fn bulk_create_items(
    db: &Database,
    sources: &SourceRegistry,
    kind: ContentKind,
    item_ids: &[String],
    batch_size: usize,
) -> Result<usize> {
    if batch_size == 0 {
        return Err(Error::InvalidInput("Batch size must be positive".into()));
    }

    let mut created = 0;
    for (batch_index, chunk) in item_ids.chunks(batch_size).enumerate() {
        let items = create_items(db, sources, kind, chunk).await?;
        let stored = items.iter().filter(|i| i.is_some()).count();
        created += stored;

        debug!(
            subsystem = "sync",
            component = "pipeline",
            batch_index,
            batch_len = chunk.len(),
            stored,
            "Committed bulk-create batch"
        );
    }

    Ok(created)
}

/// Re-fetch stored items and save the fresh drafts over them.
///
/// Items are processed in `item_id` order so drafts and rows stay zipped.
/// `exclude` names draft attributes to leave untouched, for example
/// `"download_timestamp"` to keep the stored download time. Returns each
/// item with a flag telling whether a fresh draft was applied; ids the
/// provider no longer knows come back unchanged with `false`.
#[instrument(skip(db, sources, items, exclude), fields(subsystem = "sync", component = "pipeline", op = "update_items", input_count = items.len()))]
pub async fn update_items(
    db: &Database,
    sources: &SourceRegistry,
    kind: ContentKind,
    mut items: Vec<ContentItem>,
    exclude: &[&str],
) -> Result<Vec<(ContentItem, bool)>> {
    // Reject unknown attribute names before any fetch work happens.
    let mut probe = ItemDraft::default();
    for attr in exclude {
        if !probe.clear_attr(attr) {
            return Err(Error::InvalidInput(format!(
                "Unknown item attribute '{}'",
                attr
            )));
        }
    }

    items.sort_by(|a, b| a.item_id.cmp(&b.item_id));
    let item_ids: Vec<String> = items.iter().map(|item| item.item_id.clone()).collect();

    let mut drafts = assemble_items(sources, kind, &item_ids).await?;
    for draft in drafts.iter_mut().flatten() {
        for attr in exclude {
            draft.clear_attr(attr);
        }
    }

    let mut results = Vec::with_capacity(items.len());
    for (item, draft) in items.into_iter().zip(drafts) {
        match draft {
            Some(draft) => {
                let saved = db.content.save_item(kind, Some(&item), &draft).await?;
                results.push((saved, true));
            }
            None => results.push((item, false)),
        }
    }

    debug!(
        subsystem = "sync",
        component = "pipeline",
        kind = %kind,
        updated = results.iter().filter(|(_, updated)| *updated).count(),
        "Updated content items"
    );

    Ok(results)
}
