//! Object storage for voice recordings.
//!
//! Recordings live in a single bucket under `recordings/<user_id>/` and are
//! referenced from notes by their public URL. Two backends are provided:
//!
//! - [`SupabaseStorageBackend`] talks to the Supabase Storage REST API.
//! - [`FilesystemBackend`] writes below a local directory; the API server
//!   serves those objects under `/files/`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use quill_db::file_storage::{generate_recording_name, recording_path, FilesystemBackend, StorageBackend};
//!
//! let backend = FilesystemBackend::new("/var/lib/quill/recordings", "http://localhost:3000/files");
//! let path = recording_path("user_1", &generate_recording_name(Some("memo.webm")));
//! backend.write(&path, &bytes, "audio/webm").await?;
//! let url = backend.public_url(&path);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::StatusCode;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use quill_core::defaults::{
    RECORDINGS_PREFIX, RECORDING_DEFAULT_EXTENSION, RECORDING_NAME_SUFFIX_LEN,
};
use quill_core::{Error, Result};

/// Storage backend trait for different storage implementations.
///
/// Paths are relative to the bucket root and must pass
/// [`validate_storage_path`].
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write data to the specified path. Existing objects are not replaced.
    async fn write(&self, path: &str, data: &[u8], content_type: &str) -> Result<()>;

    /// Read data from the specified path. `Error::NotFound` if absent.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete data at the specified path. Deleting a missing object is not
    /// an error.
    async fn delete(&self, path: &str) -> Result<()>;

    /// Check if data exists at the specified path.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Base URL that public object URLs start with.
    fn public_base(&self) -> &str;

    /// Public URL for an object.
    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_base().trim_end_matches('/'), path)
    }

    /// Recover the object path from a URL produced by [`public_url`].
    ///
    /// Returns `None` for URLs that point elsewhere.
    ///
    /// [`public_url`]: StorageBackend::public_url
    fn path_from_public_url(&self, url: &str) -> Option<String> {
        let base = self.public_base().trim_end_matches('/');
        let path = url.strip_prefix(base)?.strip_prefix('/')?;
        validate_storage_path(path).ok()?;
        Some(path.to_string())
    }
}

/// Reject paths that could escape the bucket root.
///
/// A valid path is relative, uses `/` as the only separator, and has no
/// empty, `.` or `..` segments and no control characters. Both backends
/// check every path with this before touching storage.
pub fn validate_storage_path(path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(Error::InvalidInput("Storage path cannot be empty".to_string()));
    }
    if path.starts_with('/') || path.contains('\\') {
        return Err(Error::InvalidInput(format!(
            "Invalid storage path: {}",
            path
        )));
    }
    if path.chars().any(char::is_control) {
        return Err(Error::InvalidInput(
            "Storage path cannot contain control characters".to_string(),
        ));
    }
    if path
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(Error::InvalidInput(format!(
            "Invalid storage path: {}",
            path
        )));
    }
    Ok(())
}

/// Object path of a user's recording: `recordings/<user_id>/<name>`.
pub fn recording_path(user_id: &str, name: &str) -> String {
    format!("{}/{}/{}", RECORDINGS_PREFIX, user_id, name)
}

/// Prefix under which all of a user's recordings live.
pub fn user_prefix(user_id: &str) -> String {
    format!("{}/{}/", RECORDINGS_PREFIX, user_id)
}

/// Generate `recording_<8 alphanumerics>.<ext>`.
///
/// The extension is taken from the uploaded file name when it is short and
/// alphanumeric, otherwise it falls back to `wav`.
pub fn generate_recording_name(original: Option<&str>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(RECORDING_NAME_SUFFIX_LEN)
        .map(char::from)
        .collect();

    let ext = original
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or_else(|| RECORDING_DEFAULT_EXTENSION.to_string());

    format!("recording_{}.{}", suffix, ext)
}

/// Guess a content type from the file extension.
pub fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("wav") => "audio/wav",
        Some("webm") => "audio/webm",
        Some("ogg") | Some("oga") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        Some("m4a") | Some("mp4") => "audio/mp4",
        _ => "application/octet-stream",
    }
}

// =============================================================================
// FILESYSTEM
// =============================================================================

/// Filesystem storage backend.
///
/// Objects are stored at `{base_path}/{path}` and written through a temp
/// file plus rename, so readers never see a partial recording. The API
/// server exposes them read-only under `/files/`, which is what
/// `public_base` should point at.
pub struct FilesystemBackend {
    /// Directory that plays the role of the bucket root.
    base_path: PathBuf,
    /// URL prefix of served objects, e.g. `http://localhost:3000/files`.
    public_base: String,
}

impl FilesystemBackend {
    /// Create a backend rooted at `base_path` whose objects are publicly
    /// reachable below `public_base`.
    pub fn new(base_path: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base: public_base.into(),
        }
    }

    /// Validated on-disk location of `path`.
    fn full_path(&self, path: &str) -> Result<PathBuf> {
        validate_storage_path(path)?;
        Ok(self.base_path.join(path))
    }

    /// Round-trip a small file to catch permission problems at startup.
    ///
    /// Writes, reads back and removes `.health-check/test.bin` below the
    /// root. The error names the failing filesystem call and path.
    pub async fn validate(&self) -> std::result::Result<(), String> {
        let test_dir = self.base_path.join(".health-check");
        let test_file = test_dir.join("test.bin");

        fs::create_dir_all(&test_dir)
            .await
            .map_err(|e| format!("create_dir_all({:?}): {}", test_dir, e))?;

        let data = b"storage-health-check";
        fs::write(&test_file, data)
            .await
            .map_err(|e| format!("write({:?}): {}", test_file, e))?;

        let read_data = fs::read(&test_file)
            .await
            .map_err(|e| format!("read({:?}): {}", test_file, e))?;
        if read_data != data {
            return Err("read-back mismatch".to_string());
        }

        fs::remove_file(&test_file)
            .await
            .map_err(|e| format!("remove_file({:?}): {}", test_file, e))?;
        let _ = fs::remove_dir(&test_dir).await;

        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FilesystemBackend {
    async fn write(&self, path: &str, data: &[u8], _content_type: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        debug!(storage_path = %path, size = data.len(), "file_storage: write");

        if fs::try_exists(&full_path).await? {
            return Err(Error::Storage(format!("Object already exists: {}", path)));
        }

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                warn!(parent = %parent.display(), error = %e, "file_storage: create_dir_all failed");
                e
            })?;
        }

        // Atomic write: temp file + rename
        let temp_path = full_path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            warn!(temp_path = %temp_path.display(), error = %e, "file_storage: File::create failed");
            e
        })?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &full_path).await.map_err(|e| {
            warn!(to = %full_path.display(), error = %e, "file_storage: rename failed");
            e
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&full_path, std::fs::Permissions::from_mode(0o644)).await?;
        }

        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.full_path(path)?;
        match fs::read(&full_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Object not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full_path = self.full_path(path)?;
        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full_path = self.full_path(path)?;
        Ok(fs::try_exists(full_path).await?)
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }
}

// =============================================================================
// SUPABASE
// =============================================================================

/// Default timeout for storage requests.
const STORAGE_TIMEOUT_SECS: u64 = 30;

/// Supabase Storage backend authenticated with the service-role key.
///
/// Objects are addressed as `{base_url}/storage/v1/object/{bucket}/{path}`.
/// The bucket must be public for the URLs stored on notes to play back.
pub struct SupabaseStorageBackend {
    client: reqwest::Client,
    /// Project URL without a trailing slash.
    base_url: String,
    /// Sent both as `apikey` and as the bearer token.
    service_key: String,
    bucket: String,
    /// `{base_url}/storage/v1/object/public/{bucket}`.
    public_base: String,
}

impl SupabaseStorageBackend {
    /// Create a backend for `bucket` on the project at `base_url`.
    ///
    /// A trailing slash on `base_url` is ignored. No request is made until
    /// the first storage call.
    pub fn new(base_url: &str, service_key: &str, bucket: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(STORAGE_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Storage(format!("Failed to create HTTP client: {}", e)))?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let public_base = format!("{}/storage/v1/object/public/{}", base_url, bucket);

        Ok(Self {
            client,
            base_url,
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
            public_base,
        })
    }

    /// Authenticated object endpoint for `path`.
    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    /// Log a failed response and turn it into `Error::Storage`, keeping
    /// the response body for the message.
    async fn failure(op: &str, path: &str, response: reqwest::Response) -> Error {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!(
            subsystem = "storage",
            component = "supabase",
            op,
            storage_path = %path,
            status = status.as_u16(),
            "Storage request failed"
        );
        Error::Storage(format!("{} {} failed ({}): {}", op, path, status, body))
    }
}

#[async_trait]
impl StorageBackend for SupabaseStorageBackend {
    /// Uploads with `x-upsert: false`, so an existing object is a failure.
    async fn write(&self, path: &str, data: &[u8], content_type: &str) -> Result<()> {
        validate_storage_path(path)?;
        debug!(storage_path = %path, size = data.len(), "supabase: upload");

        let response = self
            .authorized(self.client.post(self.object_url(path)))
            .header("content-type", content_type)
            .header("x-upsert", "false")
            .body(data.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::failure("upload", path, response).await);
        }
        Ok(())
    }

    /// Storage answers 400 for some missing objects; both 400 and 404 map
    /// to `Error::NotFound`.
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        validate_storage_path(path)?;

        let response = self
            .authorized(self.client.get(self.object_url(path)))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(response.bytes().await?.to_vec()),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => {
                Err(Error::NotFound(format!("Object not found: {}", path)))
            }
            _ => Err(Self::failure("download", path, response).await),
        }
    }

    async fn delete(&self, path: &str) -> Result<()> {
        validate_storage_path(path)?;
        debug!(storage_path = %path, "supabase: delete");

        let response = self
            .authorized(self.client.delete(self.object_url(path)))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Ok(()),
            _ => Err(Self::failure("delete", path, response).await),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        validate_storage_path(path)?;

        let response = self
            .authorized(self.client.head(self.object_url(path)))
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Ok(false),
            _ => Err(Self::failure("exists", path, response).await),
        }
    }

    fn public_base(&self) -> &str {
        &self.public_base
    }
}
