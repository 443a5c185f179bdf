//! Repository traits implemented by the database layer.
//!
//! These define the persistence seams so callers (the sync pipeline, tests)
//! can be written against interfaces rather than concrete SQL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::classifiers::{Alias, Classifier, ClassifierKind, ConvertOutcome};
use crate::content::{ContentItem, ContentKind, ExternalLink, ItemDraft};
use crate::error::Result;
use crate::sequence::{Sequence, SequenceMember};

// =============================================================================
// CLASSIFIER REPOSITORY
// =============================================================================

/// Repository for classifiers and their aliases.
///
/// Every mutation keeps the alias invariants: one protected alias equal to
/// the owner's slug, alias text unique within a kind.
#[async_trait]
pub trait ClassifierRepository: Send + Sync {
    /// Create a classifier with extra aliases in one transaction.
    ///
    /// A supplied alias equal to the computed slug is discarded; the slug
    /// alias is always created as protected. Any same-kind collision fails
    /// the whole transaction with `Error::DuplicateAlias`.
    async fn create_with_aliases(
        &self,
        kind: ClassifierKind,
        name: &str,
        description: Option<&str>,
        aliases: &[String],
    ) -> Result<Classifier>;

    /// Persist a classifier, recomputing its slug and re-protecting the
    /// matching alias in one transaction.
    async fn save(&self, classifier: &Classifier) -> Result<Classifier>;

    /// Check that a name's slug does not collide with an alias owned by a
    /// different classifier of the same kind. Read-only.
    async fn validate_unique(
        &self,
        kind: ClassifierKind,
        name: &str,
        id: Option<Uuid>,
    ) -> Result<()>;

    /// Merge several classifiers of one kind into a single one, unioning
    /// aliases and content links. The merged name comes from the first id.
    async fn merge(&self, kind: ClassifierKind, ids: &[Uuid]) -> Result<Classifier>;

    /// Re-create a classifier under another kind, moving aliases and content
    /// links. The source is deleted only after the target exists.
    async fn convert(&self, id: Uuid, target_kind: ClassifierKind) -> Result<Classifier>;

    /// Convert many classifiers, counting per-item alias collisions instead
    /// of aborting the remainder.
    async fn convert_bulk(
        &self,
        kind: ClassifierKind,
        ids: &[Uuid],
        target_kind: ClassifierKind,
    ) -> Result<ConvertOutcome>;

    /// Fetch a classifier by id.
    async fn get(&self, id: Uuid) -> Result<Classifier>;

    /// Fetch a classifier by kind and slug.
    async fn get_by_slug(&self, kind: ClassifierKind, slug: &str) -> Result<Classifier>;

    /// Resolve a name to a classifier via exact normalized alias or slug
    /// match. Returns `None` when nothing matches.
    async fn find_by_alias(&self, kind: ClassifierKind, text: &str) -> Result<Option<Classifier>>;

    /// List all classifiers of a kind, ordered by name.
    async fn list(&self, kind: ClassifierKind) -> Result<Vec<Classifier>>;

    /// List a classifier's aliases, protected first.
    async fn aliases_of(&self, id: Uuid) -> Result<Vec<Alias>>;

    /// Ids of content items linked to a classifier.
    async fn content_of(&self, id: Uuid) -> Result<Vec<Uuid>>;

    /// Add an unprotected alias.
    async fn add_alias(&self, id: Uuid, text: &str) -> Result<Alias>;

    /// Remove an unprotected alias. Removing the protected alias is a
    /// `Validation` error.
    async fn remove_alias(&self, id: Uuid, text: &str) -> Result<()>;

    /// Delete a classifier, cascading its aliases and content links.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// CONTENT REPOSITORY
// =============================================================================

/// Repository for content items, their classifier links and their URLs.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Create or update an item from a draft in one transaction.
    ///
    /// `kind` selects the payload shape on create and must match
    /// `existing.kind` on update. Present relationship lists replace the
    /// stored sets; absent scalar fields leave the stored values untouched.
    /// Link internalization runs as the final step, clearing old internal
    /// links only when `link_urls` was present.
    async fn save_item(
        &self,
        kind: ContentKind,
        existing: Option<&ContentItem>,
        draft: &ItemDraft,
    ) -> Result<ContentItem>;

    /// Replace external links that resolve to stored items with internal
    /// links. Returns the number of links internalized.
    async fn internalize_links(&self, id: Uuid, clear: bool) -> Result<u64>;

    /// Fetch an item by row id.
    async fn get(&self, id: Uuid) -> Result<ContentItem>;

    /// Fetch an item by kind and source-native id.
    async fn get_by_item_id(&self, kind: ContentKind, item_id: &str)
        -> Result<Option<ContentItem>>;

    /// Resolve a URL through the converter registry to a stored item.
    ///
    /// Blog short URLs resolve by post number. `Error::NotFound` when no
    /// pattern matches or the row is absent.
    async fn find_by_url(&self, url: &str) -> Result<ContentItem>;

    /// Items ordered by publish date, newest first.
    async fn list_recent(&self, kind: Option<ContentKind>, limit: i64) -> Result<Vec<ContentItem>>;

    /// All source-native ids stored for a kind.
    async fn item_ids_of_kind(&self, kind: ContentKind) -> Result<Vec<String>>;

    /// Bulk-update edit dates from a name → edit-date index without bumping
    /// `updated_at_utc`. Returns the number of rows touched.
    async fn refresh_edit_dates(
        &self,
        kind: ContentKind,
        index: &BTreeMap<String, DateTime<Utc>>,
    ) -> Result<u64>;

    /// Latest edit date among items of a kind that were never edited after
    /// creation (`edit_date < created_at_utc`). `None` when no such item.
    async fn latest_unedited_edit_date(&self, kind: ContentKind)
        -> Result<Option<DateTime<Utc>>>;

    /// Items of a kind whose remote edit is newer than their last download
    /// (`edit_date >= download_timestamp`), ordered by item id.
    async fn list_edited_after_download(&self, kind: ContentKind) -> Result<Vec<ContentItem>>;

    /// A content item's external links, ordered by URL.
    async fn external_links_of(&self, id: Uuid) -> Result<Vec<ExternalLink>>;

    /// Row ids of items a content item links to internally.
    async fn internal_links_of(&self, id: Uuid) -> Result<Vec<Uuid>>;

    /// Delete an item, cascading its links and sequence memberships.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// SEQUENCE REPOSITORY
// =============================================================================

/// Repository for sequences and their ordered members.
#[async_trait]
pub trait SequenceRepository: Send + Sync {
    /// Create a sequence; the slug derives from the title.
    async fn create(&self, title: &str, abstract_text: &str) -> Result<Sequence>;

    /// Persist title/abstract changes, recomputing the slug.
    async fn save(&self, sequence: &Sequence) -> Result<Sequence>;

    /// Fetch a sequence by id.
    async fn get(&self, id: Uuid) -> Result<Sequence>;

    /// Fetch a sequence by slug.
    async fn get_by_slug(&self, slug: &str) -> Result<Sequence>;

    /// All sequences ordered by title.
    async fn list(&self) -> Result<Vec<Sequence>>;

    /// Delete a sequence and its memberships.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Members of a sequence ordered by position.
    async fn members(&self, sequence_id: Uuid) -> Result<Vec<SequenceMember>>;

    /// Append a member, or insert at `position` shifting later siblings.
    async fn add_member(
        &self,
        sequence_id: Uuid,
        content_id: Uuid,
        position: Option<i32>,
    ) -> Result<SequenceMember>;

    /// Remove a member and close the position gap.
    async fn remove_member(&self, sequence_id: Uuid, content_id: Uuid) -> Result<()>;

    /// Move a member to a new position, shifting siblings in between.
    async fn move_member(
        &self,
        sequence_id: Uuid,
        content_id: Uuid,
        new_position: i32,
    ) -> Result<SequenceMember>;
}
