//! Tag repository implementation.
//!
//! Tags are scoped to a user and unique per `(name, user_id)`. Creation is
//! always an upsert so concurrent saves of the same tag name converge on one
//! row.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};

use quill_core::{new_v7, Error, Result, Tag, TagRepository};

/// PostgreSQL implementation of TagRepository.
#[derive(Clone)]
pub struct PgTagRepository {
    pool: Pool<Postgres>,
}

impl PgTagRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

pub(crate) fn tag_from_row(row: &PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        user_id: row.get("user_id"),
    }
}

/// Upsert a tag inside an existing transaction.
///
/// The no-op `DO UPDATE` makes `RETURNING` yield the existing row on
/// conflict.
pub(crate) async fn upsert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    name: &str,
) -> Result<Tag> {
    let row = sqlx::query(
        r#"
        INSERT INTO tag (id, name, user_id, created_at_utc)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (name, user_id) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, name, user_id
        "#,
    )
    .bind(new_v7())
    .bind(name)
    .bind(user_id)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::Database)?;

    Ok(tag_from_row(&row))
}

#[async_trait]
impl TagRepository for PgTagRepository {
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Tag>> {
        let rows = sqlx::query("SELECT id, name, user_id FROM tag WHERE user_id = $1 ORDER BY name")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows.iter().map(tag_from_row).collect())
    }
}
