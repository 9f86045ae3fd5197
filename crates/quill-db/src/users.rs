//! Local user mirror.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tracing::debug;

use quill_core::{Error, NewUser, Result, User, UserRepository};

/// PostgreSQL implementation of UserRepository.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: Pool<Postgres>,
}

impl PgUserRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn fetch(&self, id: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, email, full_name, created_at_utc FROM app_user WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            email: row.get("email"),
            full_name: row.get("full_name"),
            created_at: row.get("created_at_utc"),
        }))
    }

    async fn insert_if_absent(&self, user: NewUser) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO app_user (id, email, full_name, created_at_utc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        let created = result.rows_affected() == 1;
        debug!(
            subsystem = "database",
            component = "users",
            op = "insert_if_absent",
            user_id = %user.id,
            created,
            "User sync"
        );
        Ok(created)
    }
}
