//! HTTP handlers for quill-api.

pub mod auth;
pub mod notes;
pub mod recordings;
pub mod system;
