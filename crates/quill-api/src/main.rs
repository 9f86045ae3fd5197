//! quill API server.

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quill_api::config::{parse_allowed_origins, ServerConfig, StorageConfig};
use quill_api::middleware::build_rate_limiter;
use quill_api::{build_router, AppState, ClerkClient, HttpSettings, SessionVerifier};
use quill_db::{
    log_pool_metrics, Database, FilesystemBackend, PoolConfig, StorageBackend,
    SupabaseStorageBackend,
};
use quill_inference::OpenAIBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "quill_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "quill_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("quill-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false)); // no ANSI in files by default
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    let config = ServerConfig::from_env()?;

    // Database
    let db = Database::connect_with_config(&config.database_url, PoolConfig::from_env()?).await?;
    db.migrate().await?;
    log_pool_metrics(db.pool());
    info!("Database migrations applied");

    // Recording storage
    let storage: Arc<dyn StorageBackend> = match &config.storage {
        StorageConfig::Supabase {
            url,
            service_key,
            bucket,
        } => {
            info!(url = %url, bucket = %bucket, "Using Supabase storage");
            Arc::new(SupabaseStorageBackend::new(url, service_key, bucket)?)
        }
        StorageConfig::Filesystem { path, public_base } => {
            let backend = FilesystemBackend::new(path, public_base.clone());
            if let Err(e) = backend.validate().await {
                anyhow::bail!("File storage validation failed: {}", e);
            }
            info!(path = %path, public_base = %public_base, "Using filesystem storage");
            Arc::new(backend)
        }
    };

    let mut state = AppState::from_database(
        &db,
        storage,
        SessionVerifier::new(&config.jwt_secret),
    )
    .with_rate_limiter(config.rate_limit.and_then(build_rate_limiter));

    match &config.clerk_secret_key {
        Some(key) => {
            state = state.with_identity(Arc::new(ClerkClient::new(&config.clerk_api_url, key)?));
            info!(api_url = %config.clerk_api_url, "Identity provider configured");
        }
        None => warn!("CLERK_SECRET_KEY not set, /api/auth is unavailable"),
    }

    match OpenAIBackend::from_env()? {
        Some(backend) => {
            info!(model = %backend.config().gen_model, "Generation backend configured");
            state = state.with_generator(Arc::new(backend));
        }
        None => warn!("LLM_API_KEY not set, rephrasing is unavailable"),
    }

    if let Some(limit) = config.rate_limit {
        info!(
            requests = limit.requests,
            period_secs = limit.period_secs,
            "Rate limiting enabled"
        );
    }

    let app = build_router(
        state,
        HttpSettings {
            allowed_origins: parse_allowed_origins(&config.allowed_origins),
            max_body_bytes: config.max_body_bytes,
        },
    );

    let addr = config.bind_address();
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
