//! Fetch + tidy dispatch producing save-ready drafts.

use chrono::Utc;
use tracing::{debug, instrument};

use curio_core::{ContentKind, ItemDraft, Result};
use curio_fetch::SourceRegistry;

/// Fetch and normalize a batch of source ids into drafts positionally
/// aligned with `item_ids`.
///
/// Ids unknown to the provider yield `None` at their position; transport
/// failures fail the whole batch. Every draft carries the same
/// `download_timestamp`.
#[instrument(skip(sources, item_ids), fields(subsystem = "sync", component = "assemble", op = "assemble_items", input_count = item_ids.len()))]
pub async fn assemble_items(
    sources: &SourceRegistry,
    kind: ContentKind,
    item_ids: &[String],
) -> Result<Vec<Option<ItemDraft>>> {
    let source = sources.get(kind)?;

    // Stamped before the fetch starts, so an upstream edit that lands
    // during the download still compares as newer than this batch.
    let download_timestamp = Utc::now();

    let raw = source.fetch_batch(item_ids).await?;
    let mut drafts = source.tidy(item_ids, &raw)?;

    for draft in drafts.iter_mut().flatten() {
        draft.download_timestamp = Some(download_timestamp);
    }

    debug!(
        subsystem = "sync",
        component = "assemble",
        kind = %kind,
        requested = item_ids.len(),
        found = drafts.iter().filter(|d| d.is_some()).count(),
        "Assembled item drafts"
    );

    Ok(drafts)
}
