//! Request middleware: UUIDv7 request ids and the global rate limiter.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use governor::{Quota, RateLimiter};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::config::RateLimitConfig;
use crate::AppState;

pub type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the limiter for `config`. A zero count or period disables it.
///
/// `requests` is both the burst size and the number of cells replenished
/// over one `period_secs` window, so one cell comes back every
/// `period / requests`.
pub fn build_rate_limiter(config: RateLimitConfig) -> Option<Arc<GlobalRateLimiter>> {
    let burst = NonZeroU32::new(u32::try_from(config.requests).unwrap_or(u32::MAX))?;
    if config.period_secs == 0 {
        return None;
    }
    let interval =
        (Duration::from_secs(config.period_secs) / burst.get()).max(Duration::from_nanos(1));
    let quota = Quota::with_period(interval)?.allow_burst(burst);
    Some(Arc::new(RateLimiter::direct(quota)))
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!(path = %request.uri().path(), "Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}
