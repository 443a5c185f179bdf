//! Transaction helpers for the link tables.
//!
//! `external_link` rows are shared by URL: many content items may point at
//! the same stored URL. The relation tables (`content_external_link`,
//! `content_internal_link`) are owned by the content repository; these
//! helpers keep the SQL for them in one place.

use chrono::Utc;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

use curio_core::defaults::URL_MAX_LENGTH;
use curio_core::text::truncate_chars;
use curio_core::uuid_utils::new_v7;
use curio_core::{Error, ExternalLink, Result};

/// Get or create the `external_link` row for a URL, returning its id.
///
/// The URL is trimmed and truncated to the column cap before lookup so the
/// same normalization applies to reads and writes.
pub(crate) async fn get_or_create_external_link_tx(
    tx: &mut Transaction<'_, Postgres>,
    url: &str,
) -> Result<Uuid> {
    let url = truncate_chars(url.trim(), URL_MAX_LENGTH);

    // The no-op update makes RETURNING yield the id on conflict too.
    let row = sqlx::query(
        "INSERT INTO external_link (id, url, created_at_utc)
         VALUES ($1, $2, $3)
         ON CONFLICT (url) DO UPDATE SET url = EXCLUDED.url
         RETURNING id",
    )
    .bind(new_v7())
    .bind(url)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(row.get("id"))
}

/// Replace a content item's external link set.
pub(crate) async fn replace_external_links_tx(
    tx: &mut Transaction<'_, Postgres>,
    content_id: Uuid,
    link_ids: &[Uuid],
) -> Result<()> {
    sqlx::query("DELETE FROM content_external_link WHERE content_id = $1")
        .bind(content_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

    for link_id in link_ids {
        sqlx::query(
            "INSERT INTO content_external_link (content_id, link_id)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(content_id)
        .bind(link_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
    }
    Ok(())
}

/// External links of a content item, ordered by URL.
pub(crate) async fn external_links_of_tx(
    tx: &mut Transaction<'_, Postgres>,
    content_id: Uuid,
) -> Result<Vec<ExternalLink>> {
    let rows = sqlx::query(
        "SELECT el.id, el.url
         FROM external_link el
         JOIN content_external_link cel ON cel.link_id = el.id
         WHERE cel.content_id = $1
         ORDER BY el.url",
    )
    .bind(content_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(rows
        .into_iter()
        .map(|row| ExternalLink {
            id: row.get("id"),
            url: row.get("url"),
        })
        .collect())
}

/// Drop all internal links of a content item.
pub(crate) async fn clear_internal_links_tx(
    tx: &mut Transaction<'_, Postgres>,
    content_id: Uuid,
) -> Result<()> {
    sqlx::query("DELETE FROM content_internal_link WHERE content_id = $1")
        .bind(content_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
    Ok(())
}

/// Swap one external relation for an internal one pointing at a stored item.
pub(crate) async fn move_link_internal_tx(
    tx: &mut Transaction<'_, Postgres>,
    content_id: Uuid,
    link_id: Uuid,
    target_id: Uuid,
) -> Result<()> {
    sqlx::query("DELETE FROM content_external_link WHERE content_id = $1 AND link_id = $2")
        .bind(content_id)
        .bind(link_id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

    sqlx::query(
        "INSERT INTO content_internal_link (content_id, target_content_id)
         VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(content_id)
    .bind(target_id)
    .execute(&mut **tx)
    .await
    .map_err(Error::Database)?;
    Ok(())
}
