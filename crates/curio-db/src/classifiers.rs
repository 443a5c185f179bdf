//! Classifier repository implementation.
//!
//! Classifiers carry the alias invariant: every classifier owns exactly one
//! protected alias whose text equals its current slug, and alias text is
//! unique within a kind. All mutations here run inside a transaction so a
//! collision anywhere rolls back the full operation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use tracing::warn;
use uuid::Uuid;

use curio_core::defaults::{DESCRIPTION_MAX_LENGTH, NAME_MAX_LENGTH};
use curio_core::text::truncate_chars;
use curio_core::uuid_utils::new_v7;
use curio_core::{
    to_slug, Alias, Classifier, ClassifierKind, ClassifierRepository, ConvertOutcome, Error,
    Result,
};

/// Validate a classifier name.
///
/// Rules:
/// - Length between 1-100 characters after trimming
/// - Must normalize to a non-empty slug (at least one alphanumeric)
///
/// Returns Ok(()) if valid, Err with message if invalid.
pub fn validate_classifier_name(name: &str) -> std::result::Result<(), String> {
    let name = name.trim();
    if name.is_empty() {
        return Err("Classifier name cannot be empty".to_string());
    }
    if name.chars().count() > NAME_MAX_LENGTH {
        return Err(format!(
            "Classifier name must be {} characters or less",
            NAME_MAX_LENGTH
        ));
    }
    if to_slug(name).is_empty() {
        return Err(format!("Name '{}' normalizes to an empty slug", name));
    }
    Ok(())
}

/// Turn a unique-constraint violation into `DuplicateAlias` carrying the
/// offending text; other database errors pass through.
fn unique_to_duplicate(err: sqlx::Error, text: &str) -> Error {
    let err = Error::Database(err);
    if err.is_unique_violation() {
        Error::DuplicateAlias(text.to_string())
    } else {
        err
    }
}

fn row_to_classifier(row: &PgRow) -> Result<Classifier> {
    let kind: String = row.get("kind");
    Ok(Classifier {
        id: row.get("id"),
        kind: kind.parse().map_err(Error::Internal)?,
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    })
}

fn row_to_alias(row: &PgRow) -> Result<Alias> {
    let kind: String = row.get("kind");
    Ok(Alias {
        id: row.get("id"),
        kind: kind.parse().map_err(Error::Internal)?,
        text: row.get("text"),
        protected: row.get("protected"),
        classifier_id: row.get("classifier_id"),
        created_at_utc: row.get("created_at_utc"),
    })
}

/// PostgreSQL implementation of ClassifierRepository.
pub struct PgClassifierRepository {
    pool: Pool<Postgres>,
}

impl PgClassifierRepository {
    /// Create a new PgClassifierRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClassifierRepository for PgClassifierRepository {
    async fn create_with_aliases(
        &self,
        kind: ClassifierKind,
        name: &str,
        description: Option<&str>,
        aliases: &[String],
    ) -> Result<Classifier> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let result = self
            .create_with_aliases_tx(&mut tx, kind, name, description, aliases)
            .await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(result)
    }

    async fn save(&self, classifier: &Classifier) -> Result<Classifier> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let result = self.save_tx(&mut tx, classifier).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(result)
    }

    async fn validate_unique(
        &self,
        kind: ClassifierKind,
        name: &str,
        id: Option<Uuid>,
    ) -> Result<()> {
        validate_classifier_name(name).map_err(Error::Validation)?;
        let slug = to_slug(name);

        let row = sqlx::query(
            "SELECT c.name FROM alias a
             JOIN classifier c ON a.classifier_id = c.id
             WHERE a.kind = $1 AND a.text = $2
               AND ($3::uuid IS NULL OR a.classifier_id <> $3)",
        )
        .bind(kind.to_string())
        .bind(&slug)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        if let Some(row) = row {
            let owner: String = row.get("name");
            return Err(Error::Validation(format!(
                "Name '{}' clashes with an alias of {} '{}'",
                name, kind, owner
            )));
        }
        Ok(())
    }

    async fn merge(&self, kind: ClassifierKind, ids: &[Uuid]) -> Result<Classifier> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let result = self.merge_tx(&mut tx, kind, ids).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(result)
    }

    async fn convert(&self, id: Uuid, target_kind: ClassifierKind) -> Result<Classifier> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let result = self.convert_tx(&mut tx, id, target_kind).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(result)
    }

    async fn convert_bulk(
        &self,
        kind: ClassifierKind,
        ids: &[Uuid],
        target_kind: ClassifierKind,
    ) -> Result<ConvertOutcome> {
        let mut outcome = ConvertOutcome::default();

        // One transaction per item: a collision rolls back that conversion
        // only, the rest of the batch proceeds.
        for id in ids {
            let mut tx = self.pool.begin().await.map_err(Error::Database)?;
            let attempt = match self.get_tx(&mut tx, *id).await {
                Ok(source) if source.kind != kind => Err(Error::InvalidInput(format!(
                    "Classifier {} is a {}, not a {}",
                    id, source.kind, kind
                ))),
                Ok(_) => self.convert_tx(&mut tx, *id, target_kind).await.map(|_| ()),
                Err(e) => Err(e),
            };

            match attempt {
                Ok(()) => {
                    tx.commit().await.map_err(Error::Database)?;
                    outcome.converted += 1;
                }
                Err(
                    e @ (Error::DuplicateAlias(_)
                    | Error::InvalidInput(_)
                    | Error::ClassifierNotFound(_)),
                ) => {
                    tx.rollback().await.map_err(Error::Database)?;
                    warn!(
                        subsystem = "database",
                        component = "classifiers",
                        op = "convert_bulk",
                        classifier_id = %id,
                        error = %e,
                        "Skipping classifier that failed to convert"
                    );
                    outcome.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(outcome)
    }

    async fn get(&self, id: Uuid) -> Result<Classifier> {
        let row = sqlx::query(
            "SELECT id, kind, name, slug, description, created_at_utc, updated_at_utc
             FROM classifier WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => row_to_classifier(&row),
            None => Err(Error::ClassifierNotFound(id)),
        }
    }

    async fn get_by_slug(&self, kind: ClassifierKind, slug: &str) -> Result<Classifier> {
        let row = sqlx::query(
            "SELECT id, kind, name, slug, description, created_at_utc, updated_at_utc
             FROM classifier WHERE kind = $1 AND slug = $2",
        )
        .bind(kind.to_string())
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => row_to_classifier(&row),
            None => Err(Error::NotFound(format!(
                "No {} with slug '{}'",
                kind, slug
            ))),
        }
    }

    async fn find_by_alias(&self, kind: ClassifierKind, text: &str) -> Result<Option<Classifier>> {
        let normalized = to_slug(text);
        if normalized.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT c.id, c.kind, c.name, c.slug, c.description,
                    c.created_at_utc, c.updated_at_utc
             FROM alias a
             JOIN classifier c ON a.classifier_id = c.id
             WHERE a.kind = $1 AND a.text = $2",
        )
        .bind(kind.to_string())
        .bind(&normalized)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_classifier).transpose()
    }

    async fn list(&self, kind: ClassifierKind) -> Result<Vec<Classifier>> {
        let rows = sqlx::query(
            "SELECT id, kind, name, slug, description, created_at_utc, updated_at_utc
             FROM classifier WHERE kind = $1 ORDER BY name",
        )
        .bind(kind.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_classifier).collect()
    }

    async fn aliases_of(&self, id: Uuid) -> Result<Vec<Alias>> {
        let rows = sqlx::query(
            "SELECT id, kind, text, protected, classifier_id, created_at_utc
             FROM alias WHERE classifier_id = $1
             ORDER BY protected DESC, text",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_alias).collect()
    }

    async fn content_of(&self, id: Uuid) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT content_id FROM content_classifier
             WHERE classifier_id = $1 ORDER BY content_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|row| row.get("content_id")).collect())
    }

    async fn add_alias(&self, id: Uuid, text: &str) -> Result<Alias> {
        let classifier = self.get(id).await?;

        let normalized = to_slug(text);
        if normalized.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Alias '{}' normalizes to an empty slug",
                text
            )));
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let alias = self
            .insert_alias_tx(&mut tx, id, classifier.kind, &normalized, false, Utc::now())
            .await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(alias)
    }

    async fn remove_alias(&self, id: Uuid, text: &str) -> Result<()> {
        let normalized = to_slug(text);

        let row = sqlx::query("SELECT protected FROM alias WHERE classifier_id = $1 AND text = $2")
            .bind(id)
            .bind(&normalized)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        let protected: bool = match row {
            Some(row) => row.get("protected"),
            None => {
                return Err(Error::NotFound(format!(
                    "No alias '{}' on classifier {}",
                    normalized, id
                )))
            }
        };
        if protected {
            return Err(Error::Validation(format!(
                "Cannot remove protected alias '{}'",
                normalized
            )));
        }

        sqlx::query("DELETE FROM alias WHERE classifier_id = $1 AND text = $2 AND NOT protected")
            .bind(id)
            .bind(&normalized)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM classifier WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::ClassifierNotFound(id));
        }
        Ok(())
    }
}

/// Transaction-aware variants.
///
/// These methods accept an existing transaction so multi-step operations
/// (merge, convert, content upserts resolving authors) compose into a
/// single atomic unit.
impl PgClassifierRepository {
    /// Create a classifier and its aliases within an existing transaction.
    pub async fn create_with_aliases_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ClassifierKind,
        name: &str,
        description: Option<&str>,
        aliases: &[String],
    ) -> Result<Classifier> {
        validate_classifier_name(name).map_err(Error::InvalidInput)?;
        let name = name.trim();
        let slug = to_slug(name);

        // Description only survives on kinds that carry one.
        let description = description
            .filter(|_| kind.supports_description())
            .filter(|d| !d.is_empty())
            .map(|d| truncate_chars(d, DESCRIPTION_MAX_LENGTH).to_string());

        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO classifier (id, kind, name, slug, description, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6, $6)",
        )
        .bind(id)
        .bind(kind.to_string())
        .bind(name)
        .bind(&slug)
        .bind(&description)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| unique_to_duplicate(e, &slug))?;

        // Supplied aliases first (deduplicated, slug dropped), then the
        // protected slug alias.
        let mut seen = vec![slug.clone()];
        for text in aliases {
            let normalized = to_slug(text);
            if normalized.is_empty() || seen.contains(&normalized) {
                continue;
            }
            self.insert_alias_tx(tx, id, kind, &normalized, false, now)
                .await?;
            seen.push(normalized);
        }
        self.insert_alias_tx(tx, id, kind, &slug, true, now).await?;

        Ok(Classifier {
            id,
            kind,
            name: name.to_string(),
            slug,
            description,
            created_at_utc: now,
            updated_at_utc: now,
        })
    }

    /// Persist name/description changes within an existing transaction,
    /// keeping the protected alias pointed at the recomputed slug.
    ///
    /// The previous slug stays behind as an unprotected alias, so renames
    /// keep resolving the old name to the same classifier.
    pub async fn save_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        classifier: &Classifier,
    ) -> Result<Classifier> {
        validate_classifier_name(&classifier.name).map_err(Error::Validation)?;
        let name = classifier.name.trim();
        let slug = to_slug(name);

        let description = classifier
            .description
            .as_deref()
            .filter(|_| classifier.kind.supports_description())
            .filter(|d| !d.is_empty())
            .map(|d| truncate_chars(d, DESCRIPTION_MAX_LENGTH).to_string());

        let now = Utc::now();
        let row = sqlx::query(
            "UPDATE classifier
             SET name = $2, slug = $3, description = $4, updated_at_utc = $5
             WHERE id = $1
             RETURNING created_at_utc",
        )
        .bind(classifier.id)
        .bind(name)
        .bind(&slug)
        .bind(&description)
        .bind(now)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| unique_to_duplicate(e, &slug))?;

        let created_at_utc: DateTime<Utc> = match row {
            Some(row) => row.get("created_at_utc"),
            None => return Err(Error::ClassifierNotFound(classifier.id)),
        };

        // Demote everything this classifier owns, then upsert the slug
        // alias back to protected. The conditional update refuses to steal
        // an alias owned by someone else, which surfaces as zero rows.
        sqlx::query("UPDATE alias SET protected = FALSE WHERE classifier_id = $1")
            .bind(classifier.id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        let result = sqlx::query(
            "INSERT INTO alias (id, kind, text, protected, classifier_id, created_at_utc)
             VALUES ($1, $2, $3, TRUE, $4, $5)
             ON CONFLICT (kind, text) DO UPDATE SET protected = TRUE
             WHERE alias.classifier_id = EXCLUDED.classifier_id",
        )
        .bind(new_v7())
        .bind(classifier.kind.to_string())
        .bind(&slug)
        .bind(classifier.id)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::DuplicateAlias(slug));
        }

        Ok(Classifier {
            id: classifier.id,
            kind: classifier.kind,
            name: name.to_string(),
            slug,
            description,
            created_at_utc,
            updated_at_utc: now,
        })
    }

    /// Merge classifiers of one kind within an existing transaction.
    pub async fn merge_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ClassifierKind,
        ids: &[Uuid],
    ) -> Result<Classifier> {
        if ids.is_empty() {
            return Err(Error::InvalidInput(
                "Nothing to merge: no classifier ids supplied".to_string(),
            ));
        }

        // Load inputs in caller order; the first one donates the name.
        let mut inputs = Vec::with_capacity(ids.len());
        for id in ids {
            let classifier = self.get_tx(tx, *id).await?;
            if classifier.kind != kind {
                return Err(Error::InvalidInput(format!(
                    "Classifier {} is a {}, not a {}",
                    id, classifier.kind, kind
                )));
            }
            inputs.push(classifier);
        }
        let name = inputs[0].name.clone();

        let description = if kind.supports_description() {
            let joined = inputs
                .iter()
                .filter_map(|c| c.description.as_deref())
                .filter(|d| !d.is_empty())
                .collect::<Vec<_>>()
                .join("/");
            if joined.is_empty() {
                None
            } else {
                Some(truncate_chars(&joined, DESCRIPTION_MAX_LENGTH).to_string())
            }
        } else {
            None
        };

        // Union of alias texts and content links, first occurrence wins.
        let mut alias_texts: Vec<String> = Vec::new();
        let mut content_ids: Vec<Uuid> = Vec::new();
        for classifier in &inputs {
            for alias in self.aliases_of_tx(tx, classifier.id).await? {
                if !alias_texts.contains(&alias.text) {
                    alias_texts.push(alias.text);
                }
            }
            for content_id in self.content_of_tx(tx, classifier.id).await? {
                if !content_ids.contains(&content_id) {
                    content_ids.push(content_id);
                }
            }
        }

        // The merged classifier reuses the inputs' name and aliases, so the
        // inputs go first. A rollback restores them.
        for classifier in &inputs {
            sqlx::query("DELETE FROM classifier WHERE id = $1")
                .bind(classifier.id)
                .execute(&mut **tx)
                .await
                .map_err(Error::Database)?;
        }

        let merged = self
            .create_with_aliases_tx(tx, kind, &name, description.as_deref(), &alias_texts)
            .await?;
        self.link_content_tx(tx, merged.id, &content_ids).await?;

        Ok(merged)
    }

    /// Re-create a classifier under another kind within an existing
    /// transaction. The source row is deleted only after the target exists.
    pub async fn convert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        target_kind: ClassifierKind,
    ) -> Result<Classifier> {
        let source = self.get_tx(tx, id).await?;
        if source.kind == target_kind {
            return Err(Error::InvalidInput(format!(
                "Classifier {} is already a {}",
                id, target_kind
            )));
        }

        let alias_texts: Vec<String> = self
            .aliases_of_tx(tx, id)
            .await?
            .into_iter()
            .map(|a| a.text)
            .collect();
        let content_ids = self.content_of_tx(tx, id).await?;

        // Alias text is unique per kind, so the target never collides with
        // the still-present source. Collisions with other targets abort
        // here, before anything is deleted.
        let target = self
            .create_with_aliases_tx(
                tx,
                target_kind,
                &source.name,
                source.description.as_deref(),
                &alias_texts,
            )
            .await?;
        self.link_content_tx(tx, target.id, &content_ids).await?;

        sqlx::query("DELETE FROM classifier WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(Error::Database)?;

        Ok(target)
    }

    /// Fetch a classifier by id within an existing transaction.
    pub async fn get_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Classifier> {
        let row = sqlx::query(
            "SELECT id, kind, name, slug, description, created_at_utc, updated_at_utc
             FROM classifier WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => row_to_classifier(&row),
            None => Err(Error::ClassifierNotFound(id)),
        }
    }

    /// Resolve a normalized name within an existing transaction.
    pub async fn find_by_alias_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        kind: ClassifierKind,
        text: &str,
    ) -> Result<Option<Classifier>> {
        let normalized = to_slug(text);
        if normalized.is_empty() {
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT c.id, c.kind, c.name, c.slug, c.description,
                    c.created_at_utc, c.updated_at_utc
             FROM alias a
             JOIN classifier c ON a.classifier_id = c.id
             WHERE a.kind = $1 AND a.text = $2",
        )
        .bind(kind.to_string())
        .bind(&normalized)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(row_to_classifier).transpose()
    }

    async fn aliases_of_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Vec<Alias>> {
        let rows = sqlx::query(
            "SELECT id, kind, text, protected, classifier_id, created_at_utc
             FROM alias WHERE classifier_id = $1
             ORDER BY protected DESC, text",
        )
        .bind(id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        rows.iter().map(row_to_alias).collect()
    }

    async fn content_of_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Vec<Uuid>> {
        let rows = sqlx::query(
            "SELECT content_id FROM content_classifier
             WHERE classifier_id = $1 ORDER BY content_id",
        )
        .bind(id)
        .fetch_all(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(|row| row.get("content_id")).collect())
    }

    async fn link_content_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        classifier_id: Uuid,
        content_ids: &[Uuid],
    ) -> Result<()> {
        for content_id in content_ids {
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

    async fn insert_alias_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        classifier_id: Uuid,
        kind: ClassifierKind,
        text: &str,
        protected: bool,
        now: DateTime<Utc>,
    ) -> Result<Alias> {
        let id = new_v7();
        sqlx::query(
            "INSERT INTO alias (id, kind, text, protected, classifier_id, created_at_utc)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(id)
        .bind(kind.to_string())
        .bind(text)
        .bind(protected)
        .bind(classifier_id)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| unique_to_duplicate(e, text))?;

        Ok(Alias {
            id,
            kind,
            text: text.to_string(),
            protected,
            classifier_id,
            created_at_utc: now,
        })
    }
}
