//! Note repository implementation.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{postgres::PgRow, Pool, Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use quill_core::{
    new_v7, CreateNoteRequest, Error, Note, NoteRepository, Result, Tag, UpdateNoteRequest,
};

use crate::tags::{tag_from_row, upsert_tx};

const NOTE_COLUMNS: &str =
    "id, user_id, title, content, recording, is_pinned, created_at_utc, updated_at_utc";

/// PostgreSQL implementation of NoteRepository.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn note_from_row(row: &PgRow, tags: Vec<Tag>) -> Note {
    Note {
        id: row.get("id"),
        title: row.get("title"),
        content: row.get("content"),
        recording: row.get("recording"),
        is_pinned: row.get("is_pinned"),
        date: row.get("created_at_utc"),
        updated_at: row.get("updated_at_utc"),
        user_id: row.get("user_id"),
        tags,
    }
}

/// Tags of several notes in one round trip, keyed by note id.
async fn tags_for_notes(
    conn: &mut sqlx::PgConnection,
    note_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<Tag>>> {
    let mut by_note: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    if note_ids.is_empty() {
        return Ok(by_note);
    }

    let rows = sqlx::query(
        r#"
        SELECT nt.note_id, t.id, t.name, t.user_id
        FROM note_tag nt
        JOIN tag t ON t.id = nt.tag_id
        WHERE nt.note_id = ANY($1)
        ORDER BY t.name
        "#,
    )
    .bind(note_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(Error::Database)?;

    for row in rows {
        let note_id: Uuid = row.get("note_id");
        by_note.entry(note_id).or_default().push(tag_from_row(&row));
    }
    Ok(by_note)
}

/// Link normalised tag names to a note, upserting each tag for `user_id`.
async fn link_tags_tx(
    tx: &mut Transaction<'_, Postgres>,
    note_id: Uuid,
    user_id: &str,
    names: &[String],
) -> Result<()> {
    for name in names {
        let tag = upsert_tx(tx, user_id, name).await?;
        sqlx::query(
            "INSERT INTO note_tag (note_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(note_id)
        .bind(tag.id)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
    }
    Ok(())
}

impl PgNoteRepository {
    /// Insert a note and its tag links inside an existing transaction.
    pub async fn insert_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        req: CreateNoteRequest,
    ) -> Result<Note> {
        let id = new_v7();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO note (id, user_id, title, content, recording, is_pinned, created_at_utc, updated_at_utc)
            VALUES ($1, $2, $3, $4, $5, FALSE, $6, $6)
            "#,
        )
        .bind(id)
        .bind(&req.user_id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(&req.recording)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        link_tags_tx(tx, id, &req.user_id, &req.tags).await?;

        self.fetch_tx(tx, id).await
    }

    /// Fetch a note with its tags inside an existing transaction.
    pub async fn fetch_tx(&self, tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Note> {
        let row = sqlx::query(&format!("SELECT {} FROM note WHERE id = $1", NOTE_COLUMNS))
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::NoteNotFound(id))?;

        let mut tags = tags_for_notes(&mut **tx, &[id]).await?;
        Ok(note_from_row(&row, tags.remove(&id).unwrap_or_default()))
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn insert(&self, req: CreateNoteRequest) -> Result<Note> {
        let start = Instant::now();
        let user_id = req.user_id.clone();
        let tag_count = req.tags.len();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let note = self.insert_tx(&mut tx, req).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "insert",
            note_id = %note.id,
            user_id = %user_id,
            tag_count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Note created"
        );
        Ok(note)
    }

    async fn fetch(&self, id: Uuid) -> Result<Note> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let note = self.fetch_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(note)
    }

    async fn owner_of(&self, id: Uuid) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT user_id FROM note WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Note>> {
        let start = Instant::now();
        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM note WHERE user_id = $1 ORDER BY created_at_utc DESC, id DESC",
            NOTE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(Error::Database)?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.get("id")).collect();
        let mut tags = tags_for_notes(&mut *conn, &ids).await?;

        let notes: Vec<Note> = rows
            .iter()
            .map(|row| {
                let id: Uuid = row.get("id");
                note_from_row(row, tags.remove(&id).unwrap_or_default())
            })
            .collect();

        debug!(
            subsystem = "database",
            component = "notes",
            op = "list_for_user",
            user_id = %user_id,
            result_count = notes.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Listed notes"
        );
        Ok(notes)
    }

    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Row lock serialises concurrent autosaves of the same note
        let user_id: String =
            sqlx::query_scalar("SELECT user_id FROM note WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(Error::Database)?
                .ok_or(Error::NoteNotFound(id))?;

        let mut sets = vec!["updated_at_utc = $2".to_string()];
        let mut param_idx = 3;
        if req.title.is_some() {
            sets.push(format!("title = ${}", param_idx));
            param_idx += 1;
        }
        if req.content.is_some() {
            sets.push(format!("content = ${}", param_idx));
            param_idx += 1;
        }
        if req.recording.is_some() {
            sets.push(format!("recording = ${}", param_idx));
        }

        let sql = format!("UPDATE note SET {} WHERE id = $1", sets.join(", "));
        let mut query = sqlx::query(&sql).bind(id).bind(Utc::now());
        if let Some(title) = &req.title {
            query = query.bind(title);
        }
        if let Some(content) = &req.content {
            query = query.bind(content);
        }
        if let Some(recording) = &req.recording {
            query = query.bind(recording.as_deref());
        }
        query.execute(&mut *tx).await.map_err(Error::Database)?;

        if let Some(names) = &req.tags {
            sqlx::query("DELETE FROM note_tag WHERE note_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;
            link_tags_tx(&mut tx, id, &user_id, names).await?;
        }

        let note = self.fetch_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "database",
            component = "notes",
            op = "update",
            note_id = %id,
            tags_replaced = req.tags.is_some(),
            "Note updated"
        );
        Ok(note)
    }

    async fn set_pinned(&self, id: Uuid, pinned: bool) -> Result<Note> {
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let result =
            sqlx::query("UPDATE note SET is_pinned = $2, updated_at_utc = $3 WHERE id = $1")
                .bind(id)
                .bind(pinned)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }

        let note = self.fetch_tx(&mut tx, id).await?;
        tx.commit().await.map_err(Error::Database)?;
        Ok(note)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM note WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        if result.rows_affected() == 0 {
            return Err(Error::NoteNotFound(id));
        }
        debug!(
            subsystem = "database",
            component = "notes",
            op = "delete",
            note_id = %id,
            "Note deleted"
        );
        Ok(())
    }
}
