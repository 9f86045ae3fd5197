//! Dashboard listing: filtering, ordering and grouping notes by date.
//!
//! Sections follow the order a user scans a notes app: `Today`, `Yesterday`,
//! `Previous 7 days`, `Previous 30 days`, then one section per calendar
//! month (`"September 2026"`) in order of first appearance. The four fixed
//! sections are always present, even when empty.

use chrono::{Duration, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::defaults::PREVIEW_LENGTH;
use crate::html::preview;
use crate::models::Note;

pub const SECTION_TODAY: &str = "Today";
pub const SECTION_YESTERDAY: &str = "Yesterday";
pub const SECTION_PREVIOUS_7_DAYS: &str = "Previous 7 days";
pub const SECTION_PREVIOUS_30_DAYS: &str = "Previous 30 days";

/// Ordering applied within the pinned and unpinned partitions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Newest first.
    #[default]
    Date,
    /// Alphabetical, case-insensitive.
    Title,
}

/// Filter for note listings.
#[derive(Debug, Clone, Default)]
pub struct NoteFilter {
    /// Case-insensitive substring of the title.
    pub query: Option<String>,
    /// Exact tag name.
    pub tag: Option<String>,
    pub sort: SortBy,
}

impl NoteFilter {
    fn normalized_query(&self) -> Option<String> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

/// Apply a filter and order the result with pinned notes first.
pub fn filter_and_sort(notes: Vec<Note>, filter: &NoteFilter) -> Vec<Note> {
    let query = filter.normalized_query();
    let tag = filter.tag.as_deref().filter(|t| !t.is_empty());

    let mut result: Vec<Note> = notes
        .into_iter()
        .filter(|note| {
            query
                .as_deref()
                .map_or(true, |q| note.title.to_lowercase().contains(q))
        })
        .filter(|note| tag.map_or(true, |t| note.has_tag(t)))
        .collect();

    result.sort_by(|a, b| {
        b.is_pinned.cmp(&a.is_pinned).then_with(|| match filter.sort {
            SortBy::Date => b.date.cmp(&a.date),
            SortBy::Title => a
                .title
                .to_lowercase()
                .cmp(&b.title.to_lowercase())
                .then_with(|| a.title.cmp(&b.title)),
        })
    });

    result
}

/// A note as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardEntry {
    #[serde(flatten)]
    pub note: Note,
    /// Plain-text excerpt of the content.
    pub preview: String,
}

impl From<Note> for DashboardEntry {
    fn from(note: Note) -> Self {
        let preview = preview(&note.content, PREVIEW_LENGTH);
        Self { note, preview }
    }
}

/// A labelled group of notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSection {
    pub label: String,
    pub notes: Vec<DashboardEntry>,
}

impl DashboardSection {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            notes: Vec::new(),
        }
    }
}

/// Group notes into date sections relative to `today`.
///
/// A note's day is its creation time seen from `offset`. Input order is
/// preserved inside each section, so filter and sort first. Dates after
/// `today` land in `Previous 7 days`.
pub fn group_notes_by_date(
    notes: Vec<Note>,
    today: NaiveDate,
    offset: FixedOffset,
) -> Vec<DashboardSection> {
    let yesterday = today - Duration::days(1);
    let seven_days_ago = today - Duration::days(7);
    let thirty_days_ago = today - Duration::days(30);

    let mut sections = vec![
        DashboardSection::new(SECTION_TODAY),
        DashboardSection::new(SECTION_YESTERDAY),
        DashboardSection::new(SECTION_PREVIOUS_7_DAYS),
        DashboardSection::new(SECTION_PREVIOUS_30_DAYS),
    ];

    for note in notes {
        let day = note.date.with_timezone(&offset).date_naive();
        let index = if day == today {
            0
        } else if day == yesterday {
            1
        } else if day >= seven_days_ago {
            2
        } else if day >= thirty_days_ago {
            3
        } else {
            let label = day.format("%B %Y").to_string();
            match sections.iter().position(|s| s.label == label) {
                Some(i) => i,
                None => {
                    sections.push(DashboardSection::new(label));
                    sections.len() - 1
                }
            }
        };
        sections[index].notes.push(note.into());
    }

    sections
}
