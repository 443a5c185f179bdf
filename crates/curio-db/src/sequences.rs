//! Sequence repository implementation.
//!
//! Sequences are ordered reading lists over content items. Member positions
//! are contiguous from 1; insertion, removal and moves renumber siblings
//! inside the same transaction. The `(sequence_id, position)` constraint is
//! deferred so shifts may pass through transient duplicates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use curio_core::defaults::{ABSTRACT_MAX_LENGTH, TITLE_MAX_LENGTH};
use curio_core::text::truncate_chars;
use curio_core::uuid_utils::new_v7;
use curio_core::{to_slug, Error, Result, Sequence, SequenceMember, SequenceRepository};

/// Validate a sequence title.
fn validate_title(title: &str) -> Result<()> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidInput("Sequence title cannot be empty".to_string()));
    }
    if title.chars().count() > TITLE_MAX_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Sequence title must be {} characters or less",
            TITLE_MAX_LENGTH
        )));
    }
    if to_slug(title).is_empty() {
        return Err(Error::InvalidInput(format!(
            "Title '{}' normalizes to an empty slug",
            title
        )));
    }
    Ok(())
}

fn slug_taken(err: sqlx::Error, slug: &str) -> Error {
    let err = Error::Database(err);
    if err.is_unique_violation() {
        Error::Validation(format!("Sequence slug '{}' is already in use", slug))
    } else {
        err
    }
}

fn row_to_sequence(row: &PgRow) -> Sequence {
    Sequence {
        id: row.get("id"),
        title: row.get("title"),
        slug: row.get("slug"),
        abstract_text: row.get("abstract_text"),
        created_at_utc: row.get("created_at_utc"),
        updated_at_utc: row.get("updated_at_utc"),
    }
}

fn row_to_member(row: &PgRow) -> SequenceMember {
    SequenceMember {
        id: row.get("id"),
        sequence_id: row.get("sequence_id"),
        content_id: row.get("content_id"),
        position: row.get("position"),
    }
}

/// PostgreSQL implementation of SequenceRepository.
pub struct PgSequenceRepository {
    pool: Pool<Postgres>,
}

impl PgSequenceRepository {
    /// Create a new PgSequenceRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn member_of_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sequence_id: Uuid,
        content_id: Uuid,
    ) -> Result<Option<SequenceMember>> {
        let row = sqlx::query(
            "SELECT id, sequence_id, content_id, position
             FROM sequence_member
             WHERE sequence_id = $1 AND content_id = $2",
        )
        .bind(sequence_id)
        .bind(content_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(row_to_member))
    }

    async fn max_position_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sequence_id: Uuid,
    ) -> Result<i32> {
        let row = sqlx::query(
            "SELECT COALESCE(MAX(position), 0) AS max_position
             FROM sequence_member WHERE sequence_id = $1",
        )
        .bind(sequence_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Ok(row.get("max_position"))
    }

    async fn ensure_exists_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        sequence_id: Uuid,
    ) -> Result<()> {
        let row = sqlx::query("SELECT 1 AS one FROM sequence WHERE id = $1")
            .bind(sequence_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;

        if row.is_none() {
            return Err(Error::SequenceNotFound(sequence_id));
        }
        Ok(())
    }
}

#[async_trait]
impl SequenceRepository for PgSequenceRepository {
    async fn create(&self, title: &str, abstract_text: &str) -> Result<Sequence> {
        validate_title(title)?;
        let title = title.trim();
        let slug = to_slug(title);
        let abstract_text = truncate_chars(abstract_text, ABSTRACT_MAX_LENGTH);

        let id = new_v7();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sequence (id, title, slug, abstract_text, created_at_utc, updated_at_utc)
             VALUES ($1, $2, $3, $4, $5, $5)",
        )
        .bind(id)
        .bind(title)
        .bind(&slug)
        .bind(abstract_text)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| slug_taken(e, &slug))?;

        Ok(Sequence {
            id,
            title: title.to_string(),
            slug,
            abstract_text: abstract_text.to_string(),
            created_at_utc: now,
            updated_at_utc: now,
        })
    }

    async fn save(&self, sequence: &Sequence) -> Result<Sequence> {
        validate_title(&sequence.title)?;
        let title = sequence.title.trim();
        let slug = to_slug(title);
        let abstract_text = truncate_chars(&sequence.abstract_text, ABSTRACT_MAX_LENGTH);

        let now = Utc::now();
        let row = sqlx::query(
            "UPDATE sequence
             SET title = $2, slug = $3, abstract_text = $4, updated_at_utc = $5
             WHERE id = $1
             RETURNING created_at_utc",
        )
        .bind(sequence.id)
        .bind(title)
        .bind(&slug)
        .bind(abstract_text)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| slug_taken(e, &slug))?;

        let created_at_utc: DateTime<Utc> = match row {
            Some(row) => row.get("created_at_utc"),
            None => return Err(Error::SequenceNotFound(sequence.id)),
        };

        Ok(Sequence {
            id: sequence.id,
            title: title.to_string(),
            slug,
            abstract_text: abstract_text.to_string(),
            created_at_utc,
            updated_at_utc: now,
        })
    }

    async fn get(&self, id: Uuid) -> Result<Sequence> {
        let row = sqlx::query(
            "SELECT id, title, slug, abstract_text, created_at_utc, updated_at_utc
             FROM sequence WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => Ok(row_to_sequence(&row)),
            None => Err(Error::SequenceNotFound(id)),
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Sequence> {
        let row = sqlx::query(
            "SELECT id, title, slug, abstract_text, created_at_utc, updated_at_utc
             FROM sequence WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        match row {
            Some(row) => Ok(row_to_sequence(&row)),
            None => Err(Error::NotFound(format!("No sequence with slug '{}'", slug))),
        }
    }

    async fn list(&self) -> Result<Vec<Sequence>> {
        let rows = sqlx::query(
            "SELECT id, title, slug, abstract_text, created_at_utc, updated_at_utc
             FROM sequence ORDER BY title",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_sequence).collect())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM sequence WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::SequenceNotFound(id));
        }
        Ok(())
    }

    async fn members(&self, sequence_id: Uuid) -> Result<Vec<SequenceMember>> {
        let rows = sqlx::query(
            "SELECT id, sequence_id, content_id, position
             FROM sequence_member
             WHERE sequence_id = $1 ORDER BY position",
        )
        .bind(sequence_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(row_to_member).collect())
    }

    async fn add_member(
        &self,
        sequence_id: Uuid,
        content_id: Uuid,
        position: Option<i32>,
    ) -> Result<SequenceMember> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        self.ensure_exists_tx(&mut tx, sequence_id).await?;
        if self
            .member_of_tx(&mut tx, sequence_id, content_id)
            .await?
            .is_some()
        {
            return Err(Error::Validation(format!(
                "Content {} is already in sequence {}",
                content_id, sequence_id
            )));
        }

        let max = self.max_position_tx(&mut tx, sequence_id).await?;
        let position = match position {
            None => max + 1,
            Some(p) => p.clamp(1, max + 1),
        };

        if position <= max {
            sqlx::query(
                "UPDATE sequence_member SET position = position + 1
                 WHERE sequence_id = $1 AND position >= $2",
            )
            .bind(sequence_id)
            .bind(position)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        let id = new_v7();
        sqlx::query(
            "INSERT INTO sequence_member (id, sequence_id, content_id, position)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(sequence_id)
        .bind(content_id)
        .bind(position)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        Ok(SequenceMember {
            id,
            sequence_id,
            content_id,
            position,
        })
    }

    async fn remove_member(&self, sequence_id: Uuid, content_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let member = self
            .member_of_tx(&mut tx, sequence_id, content_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Content {} is not in sequence {}",
                    content_id, sequence_id
                ))
            })?;

        sqlx::query("DELETE FROM sequence_member WHERE id = $1")
            .bind(member.id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        // Close the gap left behind.
        sqlx::query(
            "UPDATE sequence_member SET position = position - 1
             WHERE sequence_id = $1 AND position > $2",
        )
        .bind(sequence_id)
        .bind(member.position)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn move_member(
        &self,
        sequence_id: Uuid,
        content_id: Uuid,
        new_position: i32,
    ) -> Result<SequenceMember> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let member = self
            .member_of_tx(&mut tx, sequence_id, content_id)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "Content {} is not in sequence {}",
                    content_id, sequence_id
                ))
            })?;

        let max = self.max_position_tx(&mut tx, sequence_id).await?;
        let new_position = new_position.clamp(1, max);
        if new_position == member.position {
            tx.commit().await.map_err(Error::Database)?;
            return Ok(member);
        }

        if new_position < member.position {
            sqlx::query(
                "UPDATE sequence_member SET position = position + 1
                 WHERE sequence_id = $1 AND position >= $2 AND position < $3",
            )
            .bind(sequence_id)
            .bind(new_position)
            .bind(member.position)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            sqlx::query(
                "UPDATE sequence_member SET position = position - 1
                 WHERE sequence_id = $1 AND position > $2 AND position <= $3",
            )
            .bind(sequence_id)
            .bind(member.position)
            .bind(new_position)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        sqlx::query("UPDATE sequence_member SET position = $2 WHERE id = $1")
            .bind(member.id)
            .bind(new_position)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        Ok(SequenceMember {
            position: new_position,
            ..member
        })
    }
}
