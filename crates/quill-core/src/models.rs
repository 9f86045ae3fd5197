//! Data models for quill.
//!
//! Wire representations use camelCase field names so existing web clients
//! can consume them unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// NOTES
// =============================================================================

/// A user's rich-text note together with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    /// Title, possibly empty while the user is still typing.
    pub title: String,
    /// HTML produced by the rich-text editor.
    pub content: String,
    /// Public URL of the attached voice recording.
    pub recording: Option<String>,
    pub is_pinned: bool,
    /// Creation timestamp.
    pub date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Owning user (identity-provider id).
    pub user_id: String,
    pub tags: Vec<Tag>,
}

impl Note {
    /// Whether the note carries a tag with exactly this name.
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|t| t.name == name)
    }

    /// Whether `user_id` owns this note.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// Request for creating a note.
#[derive(Debug, Clone, Default)]
pub struct CreateNoteRequest {
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub recording: Option<String>,
    /// Already normalised tag names.
    pub tags: Vec<String>,
}

/// Partial update of a note. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    /// `Some(None)` clears the recording.
    pub recording: Option<Option<String>>,
    /// Replaces the tag set when present. Already normalised.
    pub tags: Option<Vec<String>>,
}

impl UpdateNoteRequest {
    /// True when the request would not change any column or link.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.recording.is_none()
            && self.tags.is_none()
    }
}

// =============================================================================
// TAGS
// =============================================================================

/// A user-scoped label. Names are unique per user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub user_id: String,
}

/// Tag projection returned by the tag listing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagName {
    pub name: String,
}

impl From<Tag> for TagName {
    fn from(tag: Tag) -> Self {
        Self { name: tag.name }
    }
}

// =============================================================================
// USERS
// =============================================================================

/// Local mirror of an identity-provider user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Values used to create the local user row on first sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
}
