//! Voice recording upload, delete and public read-through.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use quill_db::file_storage::{
    content_type_for, generate_recording_name, recording_path, validate_storage_path,
};

use crate::extract::{ApiMultipart, ApiPath};
use crate::{ApiError, AppState, RequireUser};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Object path inside the bucket.
    pub path: String,
    /// Public URL to store on the note.
    pub url: String,
}

/// Store an uploaded recording under the caller's prefix.
///
/// # Multipart Fields
/// - `file`: audio file (required)
pub async fn upload_recording(
    State(state): State<AppState>,
    user: RequireUser,
    ApiMultipart(mut multipart): ApiMultipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload: Option<(Option<String>, Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
        upload = Some((file_name, content_type, data.to_vec()));
    }

    let (file_name, content_type, data) = upload
        .ok_or_else(|| ApiError::BadRequest("Missing file in multipart form".to_string()))?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("Recording file is empty".to_string()));
    }

    let name = generate_recording_name(file_name.as_deref());
    let path = recording_path(&user.user_id, &name);
    let content_type = content_type.unwrap_or_else(|| content_type_for(&name).to_string());

    state.storage.write(&path, &data, &content_type).await?;
    info!(
        subsystem = "api",
        op = "upload",
        user_id = %user.user_id,
        storage_path = %path,
        size = data.len(),
        "Stored recording"
    );

    let url = state.storage.public_url(&path);
    Ok(Json(UploadResponse { path, url }))
}

/// Delete one of the caller's recordings by file name.
pub async fn delete_recording(
    State(state): State<AppState>,
    user: RequireUser,
    ApiPath(name): ApiPath<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if name.trim().is_empty() || name.contains('/') || name.contains("..") {
        return Err(ApiError::BadRequest("Invalid recording name".to_string()));
    }

    let path = recording_path(&user.user_id, &name);
    state.storage.delete(&path).await?;
    info!(subsystem = "api", op = "delete_recording", storage_path = %path, "Deleted recording");

    Ok(Json(json!({ "message": "Recording deleted successfully" })))
}

/// Serve a stored object. Public URLs of the filesystem backend point here.
pub async fn serve_file(
    State(state): State<AppState>,
    ApiPath(path): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    validate_storage_path(&path)?;
    let data = state.storage.read(&path).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], data))
}
