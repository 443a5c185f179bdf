//! Content item repository implementation.
//!
//! `save_item` is the single write path for items: base row and payload,
//! then authors, then plain classifier names partitioned across idea, topic
//! and tag, then external links, then link internalization. Everything runs
//! in one transaction so a failed step leaves no partial item behind.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use curio_core::defaults::{
    DESCRIPTION_HTML_MAX_LENGTH, EDIT_DATE_REFRESH_BATCH, ITEM_ID_MAX_LENGTH, TITLE_MAX_LENGTH,
};
use curio_core::text::truncate_chars;
use curio_core::uuid_utils::new_v7;
use curio_core::{
    to_slug, ClassifierKind, ContentItem, ContentKind, ContentPayload, ContentRepository,
    ConverterRegistry, Error, ExternalLink, IdScheme, ItemDraft, Result,
};

use crate::classifiers::PgClassifierRepository;
use crate::links;

fn row_to_item(row: &PgRow) -> Result<ContentItem> {
    let kind: String = row.get("kind");
    let kind: ContentKind = kind.parse().map_err(Error::Internal)?;
    let payload: serde_json::Value = row.get("payload");

    Ok(ContentItem {
        id: row.get("id"),
        kind,
        item_id: row.get("item_id"),
        title: row.get("title"),
        publish_date: row.get("publish_date"),
        edit_date: row.get("edit_date"),
        description_html: row.get("description_html"),
        download_timestamp: row.get("download_timestamp"),
        payload: ContentPayload::from_value(kind, payload)?,
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    })
}

/// PostgreSQL implementation of ContentRepository.
pub struct PgContentRepository {
    pool: Pool<Postgres>,
    classifiers: PgClassifierRepository,
    registry: ConverterRegistry,
}

impl PgContentRepository {
    /// Create a new PgContentRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            classifiers: PgClassifierRepository::new(pool.clone()),
            registry: ConverterRegistry::standard(),
            pool,
        }
    }
}

#[async_trait]
impl ContentRepository for PgContentRepository {
    async fn save_item(
        &self,
        kind: ContentKind,
        existing: Option<&ContentItem>,
        draft: &ItemDraft,
    ) -> Result<ContentItem> {
        if let Some(existing) = existing {
            if existing.kind != kind {
                return Err(Error::InvalidInput(format!(
                    "Cannot save {} draft over {} item {}",
                    kind, existing.kind, existing.id
                )));
            }
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let result = self.save_item_tx(&mut tx, kind, existing, draft).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(result)
    }

    async fn internalize_links(&self, id: Uuid, clear: bool) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let moved = self.internalize_links_tx(&mut tx, id, clear).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(moved)
    }

    async fn get(&self, id: Uuid) -> Result<ContentItem> {
        let row = sqlx::query(
            "SELECT id, kind, item_id, title, publish_date, edit_date, description_html,
                    download_timestamp, payload, created_at_utc, updated_at_utc
             FROM content_item WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => row_to_item(&row),
            None => Err(Error::ContentNotFound(id)),
        }
    }

    async fn get_by_item_id(
        &self,
        kind: ContentKind,
        item_id: &str,
    ) -> Result<Option<ContentItem>> {
        let row = sqlx::query(
            "SELECT id, kind, item_id, title, publish_date, edit_date, description_html,
                    download_timestamp, payload, created_at_utc, updated_at_utc
             FROM content_item WHERE kind = $1 AND item_id = $2",
        )
        .bind(kind.to_string())
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_item).transpose()
    }

    async fn find_by_url(&self, url: &str) -> Result<ContentItem> {
        let matched = self.registry.resolve(url).ok_or_else(|| {
            Error::NotFound(format!("No converter matches URL '{}'", url))
        })?;

        let row = match matched.scheme {
            IdScheme::ItemId => sqlx::query(
                "SELECT id, kind, item_id, title, publish_date, edit_date, description_html,
                        download_timestamp, payload, created_at_utc, updated_at_utc
                 FROM content_item WHERE kind = $1 AND item_id = $2",
            )
            .bind(matched.kind.to_string())
            .bind(&matched.value)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?,
            IdScheme::PostNumber => {
                let number: i32 = matched.value.parse().map_err(|_| {
                    Error::NotFound(format!("Post number out of range in URL '{}'", url))
                })?;
                sqlx::query(
                    "SELECT id, kind, item_id, title, publish_date, edit_date, description_html,
                            download_timestamp, payload, created_at_utc, updated_at_utc
                     FROM content_item
                     WHERE kind = $1 AND (payload->>'post_number')::int = $2",
                )
                .bind(matched.kind.to_string())
                .bind(number)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?
            }
        };

        match row {
            Some(row) => row_to_item(&row),
            None => Err(Error::NotFound(format!(
                "No stored item for URL '{}'",
                url
            ))),
        }
    }

    async fn list_recent(&self, kind: Option<ContentKind>, limit: i64) -> Result<Vec<ContentItem>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    "SELECT id, kind, item_id, title, publish_date, edit_date, description_html,
                            download_timestamp, payload, created_at_utc, updated_at_utc
                     FROM content_item WHERE kind = $1
                     ORDER BY publish_date DESC NULLS LAST, created_at_utc DESC
                     LIMIT $2",
                )
                .bind(kind.to_string())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT id, kind, item_id, title, publish_date, edit_date, description_html,
                            download_timestamp, payload, created_at_utc, updated_at_utc
                     FROM content_item
                     ORDER BY publish_date DESC NULLS LAST, created_at_utc DESC
                     LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(Error::Database)?;

        rows.iter().map(row_to_item).collect()
    }

    async fn item_ids_of_kind(&self, kind: ContentKind) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT item_id FROM content_item WHERE kind = $1 ORDER BY item_id")
            .bind(kind.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|row| row.get("item_id")).collect())
    }

    async fn refresh_edit_dates(
        &self,
        kind: ContentKind,
        index: &BTreeMap<String, DateTime<Utc>>,
    ) -> Result<u64> {
        let mut touched = 0u64;
        let entries: Vec<(&String, &DateTime<Utc>)> = index.iter().collect();

        // Deliberately leaves updated_at_utc alone: an upstream edit-date
        // refresh is bookkeeping, not a content change.
        for chunk in entries.chunks(EDIT_DATE_REFRESH_BATCH) {
            let item_ids: Vec<String> = chunk.iter().map(|(name, _)| (*name).clone()).collect();
            let edit_dates: Vec<DateTime<Utc>> = chunk.iter().map(|(_, date)| **date).collect();

            let result = sqlx::query(
                "UPDATE content_item AS ci
                 SET edit_date = v.edit_date
                 FROM (SELECT UNNEST($2::text[]) AS item_id,
                              UNNEST($3::timestamptz[]) AS edit_date) AS v
                 WHERE ci.kind = $1 AND ci.item_id = v.item_id
                   AND (ci.edit_date IS NULL OR ci.edit_date <> v.edit_date)",
            )
            .bind(kind.to_string())
            .bind(&item_ids)
            .bind(&edit_dates)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

            touched += result.rows_affected();
        }

        Ok(touched)
    }

    async fn latest_unedited_edit_date(
        &self,
        kind: ContentKind,
    ) -> Result<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            "SELECT MAX(edit_date) AS max_edit_date
             FROM content_item
             WHERE kind = $1 AND edit_date < created_at_utc",
        )
        .bind(kind.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.get("max_edit_date"))
    }

    async fn list_edited_after_download(&self, kind: ContentKind) -> Result<Vec<ContentItem>> {
        let rows = sqlx::query(
            "SELECT id, kind, item_id, title, publish_date, edit_date, description_html,
                    download_timestamp, payload, created_at_utc, updated_at_utc
             FROM content_item
             WHERE kind = $1 AND edit_date >= download_timestamp
             ORDER BY item_id",
        )
        .bind(kind.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_item).collect()
    }

    async fn external_links_of(&self, id: Uuid) -> Result<Vec<ExternalLink>> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let result = links::external_links_of_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(result)
    }

    async fn internal_links_of(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT target_content_id FROM content_internal_link
             WHERE content_id = $1 ORDER BY target_content_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| row.get("target_content_id"))
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM content_item WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ContentNotFound(id));
        }
        Ok(())
    }
}

/// Transaction-aware variants.
impl PgContentRepository {
    /// Create or update an item within an existing transaction.
    pub async fn save_item_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ContentKind,
        existing: Option<&ContentItem>,
        draft: &ItemDraft,
    ) -> Result<ContentItem> {
        let id = match existing {
            None => self.insert_item_tx(tx, kind, draft).await?,
            Some(existing) => {
                self.update_item_tx(tx, existing, draft).await?;
                existing.id
            }
        };

        if let Some(names) = &draft.author_names {
            let author_ids = self.resolve_authors_tx(tx, names).await?;
            self.replace_kind_links_tx(tx, id, &[ClassifierKind::Author], &author_ids)
                .await?;
        }

        if let Some(names) = &draft.classifier_names {
            let classifier_ids = self.resolve_classifiers_tx(tx, names).await?;
            self.replace_kind_links_tx(
                tx,
                id,
                &[
                    ClassifierKind::Idea,
                    ClassifierKind::Topic,
                    ClassifierKind::Tag,
                ],
                &classifier_ids,
            )
            .await?;
        }

        if let Some(urls) = &draft.link_urls {
            let mut link_ids = Vec::new();
            for url in urls {
                if url.trim().is_empty() {
                    continue;
                }
                let link_id = links::get_or_create_external_link_tx(tx, url).await?;
                if !link_ids.contains(&link_id) {
                    link_ids.push(link_id);
                }
            }
            links::replace_external_links_tx(tx, id, &link_ids).await?;
        }

        self.internalize_links_tx(tx, id, draft.link_urls.is_some())
            .await?;

        self.get_tx(tx, id).await
    }

    /// Replace matching external links with internal ones within an
    /// existing transaction. Returns the number of links moved.
    pub async fn internalize_links_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        clear: bool,
    ) -> Result<u64> {
        if clear {
            links::clear_internal_links_tx(tx, id).await?;
        }

        let mut moved = 0u64;
        for link in links::external_links_of_tx(tx, id).await? {
            let Some(matched) = self.registry.resolve(&link.url) else {
                continue;
            };

            let target = match matched.scheme {
                IdScheme::ItemId => self
                    .item_row_id_tx(tx, matched.kind, &matched.value)
                    .await?,
                IdScheme::PostNumber => match matched.value.parse::<i32>() {
                    Ok(number) => self.post_row_id_tx(tx, matched.kind, number).await?,
                    Err(_) => None,
                },
            };

            let Some(target_id) = target else { continue };
            if target_id == id {
                continue;
            }

            links::move_link_internal_tx(tx, id, link.id, target_id).await?;
            moved += 1;
        }

        if moved > 0 {
            debug!(
                subsystem = "database",
                component = "content",
                op = "internalize_links",
                content_id = %id,
                internalized = moved,
                "Moved external links to internal"
            );
        }
        Ok(moved)
    }

    /// Fetch an item by row id within an existing transaction.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<ContentItem> {
        let row = sqlx::query(
            "SELECT id, kind, item_id, title, publish_date, edit_date, description_html,
                    download_timestamp, payload, created_at_utc, updated_at_utc
             FROM content_item WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => row_to_item(&row),
            None => Err(Error::ContentNotFound(id)),
        }
    }

    async fn insert_item_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ContentKind,
        draft: &ItemDraft,
    ) -> Result<Uuid> {
        let item_id = draft.item_id.as_deref().ok_or_else(|| {
            Error::InvalidInput(format!("Missing required field 'item_id' for {} item", kind))
        })?;
        if item_id.is_empty() || item_id.chars().count() > ITEM_ID_MAX_LENGTH {
            return Err(Error::InvalidInput(format!(
                "Item id must be 1-{} characters",
                ITEM_ID_MAX_LENGTH
            )));
        }
        let title = draft.title.as_deref().ok_or_else(|| {
            Error::InvalidInput(format!("Missing required field 'title' for {} item", kind))
        })?;
        let download_timestamp = draft.download_timestamp.ok_or_else(|| {
            Error::InvalidInput(format!(
                "Missing required field 'download_timestamp' for {} item",
                kind
            ))
        })?;

        let payload = ContentPayload::from_draft(kind, draft)?;
        let description_html = draft.description_html.as_deref().unwrap_or("");

        let id = new_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO content_item
                 (id, kind, item_id, title, publish_date, edit_date, description_html,
                  download_timestamp, payload, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)",
        )
        .bind(id)
        .bind(kind.to_string())
        .bind(item_id)
        .bind(truncate_chars(title, TITLE_MAX_LENGTH))
        .bind(draft.publish_date)
        .bind(draft.edit_date)
        .bind(truncate_chars(description_html, DESCRIPTION_HTML_MAX_LENGTH))
        .bind(download_timestamp)
        .bind(payload.to_value()?)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(id)
    }

    async fn update_item_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        existing: &ContentItem,
        draft: &ItemDraft,
    ) -> Result<()> {
        let mut payload = existing.payload.clone();
        payload.apply_draft(draft);

        let mut updates: Vec<String> =
            vec!["updated_at_utc = $1".to_string(), "payload = $2".to_string()];
        // $1 = now, $2 = payload, $3 = id, then dynamic params start at $4
        let mut param_idx = 4;

        if draft.item_id.is_some() {
            updates.push(format!("item_id = ${}", param_idx));
            param_idx += 1;
        }
        if draft.title.is_some() {
            updates.push(format!("title = ${}", param_idx));
            param_idx += 1;
        }
        if draft.publish_date.is_some() {
            updates.push(format!("publish_date = ${}", param_idx));
            param_idx += 1;
        }
        if draft.edit_date.is_some() {
            updates.push(format!("edit_date = ${}", param_idx));
            param_idx += 1;
        }
        if draft.description_html.is_some() {
            updates.push(format!("description_html = ${}", param_idx));
            param_idx += 1;
        }
        if draft.download_timestamp.is_some() {
            updates.push(format!("download_timestamp = ${}", param_idx));
        }

        let query = format!("UPDATE content_item SET {} WHERE id = $3", updates.join(", "));

        let mut q = sqlx::query(&query)
            .bind(Utc::now())
            .bind(payload.to_value()?)
            .bind(existing.id);
        if let Some(item_id) = &draft.item_id {
            q = q.bind(item_id);
        }
        if let Some(title) = &draft.title {
            q = q.bind(truncate_chars(title, TITLE_MAX_LENGTH));
        }
        if let Some(publish_date) = draft.publish_date {
            q = q.bind(publish_date);
        }
        if let Some(edit_date) = draft.edit_date {
            q = q.bind(edit_date);
        }
        if let Some(description_html) = &draft.description_html {
            q = q.bind(truncate_chars(description_html, DESCRIPTION_HTML_MAX_LENGTH));
        }
        if let Some(download_timestamp) = draft.download_timestamp {
            q = q.bind(download_timestamp);
        }

        q.execute(&mut **tx).await.map_err(Error::Database)?;
        Ok(())
    }

    /// Resolve author names to classifier ids, creating missing authors.
    async fn resolve_authors_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        names: &[String],
    ) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        for name in names {
            if to_slug(name).is_empty() {
                debug!(
                    subsystem = "database",
                    component = "content",
                    op = "resolve_authors",
                    name = %name,
                    "Skipping author name with no sluggable characters"
                );
                continue;
            }
            let id = match self
                .classifiers
                .find_by_alias_tx(tx, ClassifierKind::Author, name)
                .await?
            {
                Some(author) => author.id,
                None => {
                    self.classifiers
                        .create_with_aliases_tx(tx, ClassifierKind::Author, name, None, &[])
                        .await?
                        .id
                }
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Partition plain names across idea, topic and tag.
    ///
    /// Ideas and topics only resolve through existing aliases; a name
    /// matching neither becomes a tag, created on demand.
    async fn resolve_classifiers_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        names: &[String],
    ) -> Result<Vec<Uuid>> {
        let mut ids = Vec::new();
        for name in names {
            if to_slug(name).is_empty() {
                debug!(
                    subsystem = "database",
                    component = "content",
                    op = "resolve_classifiers",
                    name = %name,
                    "Skipping classifier name with no sluggable characters"
                );
                continue;
            }

            let mut resolved = self
                .classifiers
                .find_by_alias_tx(tx, ClassifierKind::Idea, name)
                .await?;
            if resolved.is_none() {
                resolved = self
                    .classifiers
                    .find_by_alias_tx(tx, ClassifierKind::Topic, name)
                    .await?;
            }
            if resolved.is_none() {
                resolved = self
                    .classifiers
                    .find_by_alias_tx(tx, ClassifierKind::Tag, name)
                    .await?;
            }
            let id = match resolved {
                Some(classifier) => classifier.id,
                None => {
                    self.classifiers
                        .create_with_aliases_tx(tx, ClassifierKind::Tag, name, None, &[])
                        .await?
                        .id
                }
            };
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Replace the item's links to classifiers of the given kinds.
    async fn replace_kind_links_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        content_id: Uuid,
        kinds: &[ClassifierKind],
        classifier_ids: &[Uuid],
    ) -> Result<()> {
        for kind in kinds {
            sqlx::query(
                "DELETE FROM content_classifier cc USING classifier c
                 WHERE cc.classifier_id = c.id AND cc.content_id = $1 AND c.kind = $2",
            )
            .bind(content_id)
            .bind(kind.to_string())
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }

        for classifier_id in classifier_ids {
            sqlx::query(
                "INSERT INTO content_classifier (content_id, classifier_id)
                 VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(content_id)
            .bind(classifier_id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;
        }
        Ok(())
    }

    async fn item_row_id_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ContentKind,
        item_id: &str,
    ) -> Result<Option<Uuid>> {
        let row = sqlx::query("SELECT id FROM content_item WHERE kind = $1 AND item_id = $2")
            .bind(kind.to_string())
            .bind(item_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        Ok(row.map(|row| row.get("id")))
    }

    async fn post_row_id_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ContentKind,
        post_number: i32,
    ) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            "SELECT id FROM content_item
             WHERE kind = $1 AND (payload->>'post_number')::int = $2",
        )
        .bind(kind.to_string())
        .bind(post_number)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(row.map(|row| row.get("id")))
    }
}
