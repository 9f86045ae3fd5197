//! Note HTTP handlers.
//!
//! Every handler addressing a single note resolves its owner first: a
//! missing note is 404, a note owned by someone else is 403.

use axum::{extract::State, Json};
use chrono::{FixedOffset, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use quill_core::{
    filter_and_sort, group_notes_by_date, normalize_tags, CreateNoteRequest, DashboardSection,
    Note, NoteFilter, SortBy, TagName, UpdateNoteRequest,
};
use quill_db::file_storage::user_prefix;

use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::{ApiError, AppState, RequireUser};

// =============================================================================
// REQUEST TYPES
// =============================================================================

/// Query parameters shared by the list and dashboard endpoints.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotesQuery {
    /// Case-insensitive title substring.
    pub q: Option<String>,
    /// Exact tag name.
    pub tag: Option<String>,
    /// `date` (default) or `title`.
    pub sort: Option<String>,
    /// Client offset in minutes east of UTC. Dashboard only.
    pub tz_offset: Option<i32>,
}

impl ListNotesQuery {
    fn filter(&self) -> Result<NoteFilter, ApiError> {
        let sort = match self.sort.as_deref().map(str::trim) {
            None | Some("") | Some("date") => SortBy::Date,
            Some("title") => SortBy::Title,
            Some(other) => {
                return Err(ApiError::BadRequest(format!(
                    "Invalid sort '{}': expected 'date' or 'title'",
                    other
                )))
            }
        };
        Ok(NoteFilter {
            query: self.q.clone(),
            tag: self.tag.clone(),
            sort,
        })
    }

    fn offset(&self) -> Result<FixedOffset, ApiError> {
        let minutes = self.tz_offset.unwrap_or(0);
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid tzOffset: {}", minutes)))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub recording: Option<String>,
}

/// Partial update. Absent fields stay as they are, `"recording": null`
/// detaches the recording.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNoteBody {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub recording: Option<Option<String>>,
}

/// Distinguishes an explicit `null` from a missing field.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinBody {
    pub is_pinned: bool,
}

#[derive(Debug, Deserialize)]
pub struct RephraseBody {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct RephraseResponse {
    pub content: String,
}

// =============================================================================
// OWNERSHIP
// =============================================================================

async fn require_owner(state: &AppState, id: Uuid, user_id: &str) -> Result<(), ApiError> {
    match state.notes.owner_of(id).await? {
        None => Err(ApiError::NotFound("Note not found".to_string())),
        Some(owner) if owner != user_id => {
            debug!(subsystem = "api", note_id = %id, user_id, "Rejected access to foreign note");
            Err(ApiError::Forbidden("Forbidden".to_string()))
        }
        Some(_) => Ok(()),
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// List the caller's notes, pinned first.
pub async fn list_notes(
    State(state): State<AppState>,
    user: RequireUser,
    ApiQuery(query): ApiQuery<ListNotesQuery>,
) -> Result<Json<Vec<Note>>, ApiError> {
    let filter = query.filter()?;
    let notes = state.notes.list_for_user(&user.user_id).await?;
    Ok(Json(filter_and_sort(notes, &filter)))
}

/// The caller's notes grouped into date sections.
pub async fn dashboard(
    State(state): State<AppState>,
    user: RequireUser,
    ApiQuery(query): ApiQuery<ListNotesQuery>,
) -> Result<Json<Vec<DashboardSection>>, ApiError> {
    let filter = query.filter()?;
    let offset = query.offset()?;

    let notes = state.notes.list_for_user(&user.user_id).await?;
    let today = Utc::now().with_timezone(&offset).date_naive();

    Ok(Json(group_notes_by_date(
        filter_and_sort(notes, &filter),
        today,
        offset,
    )))
}

pub async fn create_note(
    State(state): State<AppState>,
    user: RequireUser,
    ApiJson(body): ApiJson<CreateNoteBody>,
) -> Result<Json<Note>, ApiError> {
    let tags = normalize_tags(&body.tags)?;

    let note = state
        .notes
        .insert(CreateNoteRequest {
            user_id: user.user_id,
            title: body.title,
            content: body.content,
            recording: body.recording.filter(|r| !r.trim().is_empty()),
            tags,
        })
        .await?;

    Ok(Json(note))
}

pub async fn get_note(
    State(state): State<AppState>,
    user: RequireUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Note>, ApiError> {
    require_owner(&state, id, &user.user_id).await?;
    Ok(Json(state.notes.fetch(id).await?))
}

/// Apply a partial update. Called by the client's autosave, so repeating
/// the same body yields the same note.
pub async fn update_note(
    State(state): State<AppState>,
    user: RequireUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateNoteBody>,
) -> Result<Json<Note>, ApiError> {
    require_owner(&state, id, &user.user_id).await?;

    let tags = body.tags.as_ref().map(normalize_tags).transpose()?;
    let req = UpdateNoteRequest {
        title: body.title,
        content: body.content,
        recording: body
            .recording
            .map(|r| r.filter(|url| !url.trim().is_empty())),
        tags,
    };

    let note = if req.is_empty() {
        state.notes.fetch(id).await?
    } else {
        state.notes.update(id, req).await?
    };
    Ok(Json(note))
}

/// Delete a note and, best-effort, the recording it owns.
pub async fn delete_note(
    State(state): State<AppState>,
    user: RequireUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_owner(&state, id, &user.user_id).await?;

    let note = state.notes.fetch(id).await?;
    state.notes.delete(id).await?;

    let owned_recording = note
        .recording
        .as_deref()
        .and_then(|url| state.storage.path_from_public_url(url))
        .filter(|path| path.starts_with(&user_prefix(&user.user_id)));
    if let Some(path) = owned_recording {
        if let Err(e) = state.storage.delete(&path).await {
            warn!(
                subsystem = "api",
                note_id = %id,
                storage_path = %path,
                error = %e,
                "Failed to remove recording of deleted note"
            );
        }
    }

    Ok(Json(json!({ "message": "Note deleted successfully" })))
}

/// Set the pinned flag. Missing and foreign notes both answer 403.
pub async fn pin_note(
    State(state): State<AppState>,
    user: RequireUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<PinBody>,
) -> Result<Json<Note>, ApiError> {
    let owner = state.notes.owner_of(id).await?;
    if owner.as_deref() != Some(user.user_id.as_str()) {
        return Err(ApiError::Forbidden("Unauthorized".to_string()));
    }

    Ok(Json(state.notes.set_pinned(id, body.is_pinned).await?))
}

/// All tag names of the caller, sorted by name.
pub async fn list_tags(
    State(state): State<AppState>,
    user: RequireUser,
) -> Result<Json<Vec<TagName>>, ApiError> {
    let tags = state.tags.list_for_user(&user.user_id).await?;
    Ok(Json(tags.into_iter().map(TagName::from).collect()))
}

/// Rewrite note content with the generation backend.
pub async fn rephrase_note(
    State(state): State<AppState>,
    user: RequireUser,
    ApiJson(body): ApiJson<RephraseBody>,
) -> Result<Json<RephraseResponse>, ApiError> {
    if body.content.trim().is_empty() {
        return Err(ApiError::BadRequest("Content is required".to_string()));
    }

    let backend = state.generator.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable(
            "Generation backend not configured. Set LLM_API_KEY environment variable.".to_string(),
        )
    })?;

    debug!(subsystem = "api", op = "rephrase", user_id = %user.user_id, "Rephrasing note content");
    let content = quill_inference::rephrase(backend.as_ref(), &body.content)
        .await
        .map_err(ApiError::Internal)?;

    Ok(Json(RephraseResponse { content }))
}
