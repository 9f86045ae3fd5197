//! # quill-db
//!
//! PostgreSQL database layer and recording storage for quill.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for notes, tags and users
//! - Object storage backends for voice recordings
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_db::{Database, NoteRepository, CreateNoteRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/quill").await?;
//!
//!     let note = db.notes.insert(CreateNoteRequest {
//!         user_id: "user_1".to_string(),
//!         title: "Groceries".to_string(),
//!         content: "<p>milk</p>".to_string(),
//!         recording: None,
//!         tags: vec!["home".to_string()],
//!     }).await?;
//!
//!     println!("Created note: {}", note.id);
//!     Ok(())
//! }
//! ```
pub mod file_storage;
pub mod notes;
pub mod pool;
pub mod tags;
pub mod users;

// Always compiled so integration tests (in tests/) can use it
pub mod test_fixtures;

// Re-export core types
pub use quill_core::*;

pub use file_storage::{FilesystemBackend, StorageBackend, SupabaseStorageBackend};
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use tags::PgTagRepository;
pub use users::PgUserRepository;

/// Database handle with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub notes: PgNoteRepository,
    pub tags: PgTagRepository,
    pub users: PgUserRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            notes: PgNoteRepository::new(pool.clone()),
            tags: PgTagRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
