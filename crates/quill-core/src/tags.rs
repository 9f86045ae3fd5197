//! Tag name validation and normalisation.
//!
//! Clients send the tag list they currently display. Before it reaches the
//! database every name is trimmed, blanks are dropped and duplicates are
//! collapsed so a note never links the same tag twice.

use std::collections::HashSet;

use tracing::trace;

use crate::defaults::MAX_TAG_LENGTH;
use crate::error::{Error, Result};

/// Validate a single, already trimmed tag name.
///
/// Rules:
/// - Length between 1 and [`MAX_TAG_LENGTH`] characters
/// - No control characters
pub fn validate_tag_name(tag: &str) -> std::result::Result<(), String> {
    if tag.is_empty() {
        return Err("Tag name cannot be empty".to_string());
    }
    if tag.chars().count() > MAX_TAG_LENGTH {
        return Err(format!(
            "Tag name must be {} characters or less",
            MAX_TAG_LENGTH
        ));
    }
    if tag.chars().any(char::is_control) {
        return Err("Tag name cannot contain control characters".to_string());
    }
    Ok(())
}

/// Normalise a client-supplied tag list.
///
/// Names are trimmed, empty names dropped and duplicates removed keeping the
/// first occurrence. Matching is case-sensitive, so `Work` and `work` are
/// distinct tags.
pub fn normalize_tags<I, S>(tags: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut result = Vec::new();

    for raw in tags {
        let name = raw.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        validate_tag_name(name).map_err(Error::InvalidInput)?;
        if seen.insert(name.to_string()) {
            result.push(name.to_string());
        } else {
            trace!(tag = name, "Dropping duplicate tag");
        }
    }

    Ok(result)
}
