//! # quill-core
//!
//! Core types, traits, and abstractions for the quill note service.
//!
//! This crate provides the data structures shared by the database layer,
//! the inference client and the HTTP API, together with the pure logic that
//! does not need I/O: tag normalisation, dashboard grouping and HTML preview
//! extraction.

pub mod dashboard;
pub mod defaults;
pub mod error;
pub mod html;
pub mod logging;
pub mod models;
pub mod tags;
pub mod traits;
pub mod uuid_utils;

// Re-export commonly used types at crate root
pub use dashboard::{
    filter_and_sort, group_notes_by_date, DashboardEntry, DashboardSection, NoteFilter, SortBy,
};
pub use error::{Error, Result};
pub use html::{preview, strip_html};
pub use models::*;
pub use tags::{normalize_tags, validate_tag_name};
pub use traits::*;
pub use uuid_utils::new_v7;
