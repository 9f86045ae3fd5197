//! Core traits for quill abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Repository for note CRUD operations.
///
/// Ownership checks are the caller's job; use [`NoteRepository::owner_of`]
/// before mutating.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note, upserting and linking its tags.
    async fn insert(&self, req: CreateNoteRequest) -> Result<Note>;

    /// Fetch a note with its tags. `Error::NoteNotFound` if absent.
    async fn fetch(&self, id: Uuid) -> Result<Note>;

    /// Owner of a note, `None` if the note does not exist.
    async fn owner_of(&self, id: Uuid) -> Result<Option<String>>;

    /// All notes of a user with their tags, newest first.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Note>>;

    /// Apply a partial update and return the updated note.
    async fn update(&self, id: Uuid, req: UpdateNoteRequest) -> Result<Note>;

    /// Set the pinned flag and return the updated note.
    async fn set_pinned(&self, id: Uuid, pinned: bool) -> Result<Note>;

    /// Permanently delete a note. Tag links go with it.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// TAG REPOSITORY TRAITS
// =============================================================================

/// Repository for user-scoped tags.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// All tags of a user, sorted by name.
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Tag>>;
}

// =============================================================================
// USER REPOSITORY TRAITS
// =============================================================================

/// Repository for the local user mirror.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a user by identity-provider id.
    async fn fetch(&self, id: &str) -> Result<Option<User>>;

    /// Insert the user unless a row with this id already exists.
    /// Returns `true` when a row was created.
    async fn insert_if_absent(&self, user: NewUser) -> Result<bool>;
}

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for text generation (LLM).
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate text given a prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate text with system context.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}
