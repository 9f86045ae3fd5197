//! Error types for quill.

use thiserror::Error;

/// Result type alias using quill's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for quill operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(uuid::Uuid),

    /// Object storage operation failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Identity provider call failed
    #[error("Identity provider error: {0}")]
    Identity(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Authentication failed
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (authenticated but not the owner)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

impl Error {
    /// True when the error means "the addressed resource does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::NoteNotFound(_))
    }
}
