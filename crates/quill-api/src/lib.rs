//! # quill-api
//!
//! HTTP API for the quill note service: notes, tags, voice recordings,
//! user sync and AI rephrasing behind session-token authentication.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod identity;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{delete, get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use quill_core::{GenerationBackend, NoteRepository, TagRepository, UserRepository};
use quill_db::{Database, StorageBackend};

pub use auth::{RequireUser, SessionClaims, SessionVerifier};
pub use error::ApiError;
pub use identity::{ClerkClient, IdentityProvider, IdentityUser};
pub use middleware::{GlobalRateLimiter, MakeRequestUuidV7};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub notes: Arc<dyn NoteRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub users: Arc<dyn UserRepository>,
    /// Recording object storage.
    pub storage: Arc<dyn StorageBackend>,
    pub sessions: Arc<SessionVerifier>,
    /// `None` when no identity provider is configured.
    pub identity: Option<Arc<dyn IdentityProvider>>,
    /// `None` when no generation backend is configured.
    pub generator: Option<Arc<dyn GenerationBackend>>,
    /// Global rate limiter (None if rate limiting is disabled).
    pub rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

impl AppState {
    /// State with explicit repositories and no optional services.
    pub fn new(
        notes: Arc<dyn NoteRepository>,
        tags: Arc<dyn TagRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn StorageBackend>,
        sessions: SessionVerifier,
    ) -> Self {
        Self {
            notes,
            tags,
            users,
            storage,
            sessions: Arc::new(sessions),
            identity: None,
            generator: None,
            rate_limiter: None,
        }
    }

    /// State backed by the PostgreSQL repositories.
    pub fn from_database(
        db: &Database,
        storage: Arc<dyn StorageBackend>,
        sessions: SessionVerifier,
    ) -> Self {
        Self::new(
            Arc::new(db.notes.clone()),
            Arc::new(db.tags.clone()),
            Arc::new(db.users.clone()),
            storage,
            sessions,
        )
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn GenerationBackend>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_rate_limiter(mut self, limiter: Option<Arc<GlobalRateLimiter>>) -> Self {
        self.rate_limiter = limiter;
        self
    }
}

/// HTTP-level settings for [`build_router`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub allowed_origins: Vec<HeaderValue>,
    pub max_body_bytes: usize,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            allowed_origins: vec![HeaderValue::from_static(
                quill_core::defaults::ALLOWED_ORIGINS,
            )],
            max_body_bytes: quill_core::defaults::MAX_BODY_BYTES,
        }
    }
}

/// Build the application router with all middleware.
pub fn build_router(state: AppState, settings: HttpSettings) -> Router {
    use handlers::{auth, notes, recordings, system};

    Router::new()
        .route("/health", get(system::health_check))
        // User sync
        .route("/api/auth", get(auth::get_profile).post(auth::sync_user))
        // Notes
        .route("/api/note", get(notes::list_notes))
        .route("/api/note/dashboard", get(notes::dashboard))
        .route("/api/note/create", post(notes::create_note))
        .route("/api/note/tags", get(notes::list_tags))
        .route("/api/note/rephrase", post(notes::rephrase_note))
        .route("/api/note/pin/:id", patch(notes::pin_note))
        .route(
            "/api/note/:id",
            get(notes::get_note)
                .patch(notes::update_note)
                .delete(notes::delete_note),
        )
        // Recordings
        .route("/api/recordings", post(recordings::upload_recording))
        .route("/api/recordings/:name", delete(recordings::delete_recording))
        .route("/files/*path", get(recordings::serve_file))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit_middleware,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(settings.allowed_origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(Duration::from_secs(3600)),
        )
        // The body limit layer below replaces axum's 2 MB extractor default
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(settings.max_body_bytes))
        .with_state(state)
}
