//! UUIDv7 helpers.
//!
//! Notes and tags use time-ordered UUIDv7 identifiers so that primary-key
//! order follows creation order.

use uuid::Uuid;

/// Generate a new UUIDv7.
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Check whether a UUID is version 7.
pub fn is_v7(id: &Uuid) -> bool {
    id.get_version_num() == 7
}
