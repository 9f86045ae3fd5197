//! User sync with the identity provider.
//!
//! The first authenticated request from a new browser session calls
//! `POST /api/auth`, which copies the provider's profile into the local user
//! table. Rows that already exist are left as they are.

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::identity::{IdentityProvider, IdentityUser};
use crate::{ApiError, AppState, RequireUser};

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: IdentityUser,
}

fn provider(state: &AppState) -> Result<&Arc<dyn IdentityProvider>, ApiError> {
    state.identity.as_ref().ok_or_else(|| {
        ApiError::ServiceUnavailable(
            "Identity provider not configured. Set CLERK_SECRET_KEY environment variable."
                .to_string(),
        )
    })
}

/// Return the caller's identity-provider profile.
pub async fn get_profile(
    State(state): State<AppState>,
    user: RequireUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = provider(&state)?.get_user(&user.user_id).await?;
    Ok(Json(ProfileResponse { user: profile }))
}

/// Create the local user row for the caller if it does not exist yet.
pub async fn sync_user(
    State(state): State<AppState>,
    user: RequireUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let profile = provider(&state)?.get_user(&user.user_id).await?;

    if let Some(existing) = state.users.fetch(&profile.id).await? {
        debug!(
            subsystem = "api",
            op = "sync_user",
            user_id = %existing.id,
            created_at = %existing.created_at,
            "User already present"
        );
        return Ok(Json(json!({ "message": "User handled successfully!" })));
    }

    // A concurrent sync may have inserted the row since the lookup.
    let created = state.users.insert_if_absent(profile.to_new_user()).await?;
    if created {
        info!(subsystem = "api", op = "sync_user", user_id = %user.user_id, "Created local user");
    } else {
        debug!(subsystem = "api", op = "sync_user", user_id = %user.user_id, "User created concurrently");
    }

    Ok(Json(json!({ "message": "User handled successfully!" })))
}
