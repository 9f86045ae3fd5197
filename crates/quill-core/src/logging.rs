//! Structured logging field name constants for quill.
//!
//! All crates use these names for structured `tracing` fields so that log
//! aggregation can query by the same keys across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Request failed on the server side, requires operator attention |
//! | WARN  | Recoverable issue (best-effort cleanup failed, bad token) |
//! | INFO  | Lifecycle events (startup, shutdown), user sync |
//! | DEBUG | Per-request decisions, repository calls |
//! | TRACE | High-volume detail (tag normalisation) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "storage", "inference", "identity"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "notes", "supabase", "openai"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "create", "update", "rephrase", "upload"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Note UUID being operated on.
pub const NOTE_ID: &str = "note_id";

/// Authenticated user id (identity-provider id).
pub const USER_ID: &str = "user_id";

/// Object storage path.
pub const STORAGE_PATH: &str = "storage_path";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a query.
pub const RESULT_COUNT: &str = "result_count";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
