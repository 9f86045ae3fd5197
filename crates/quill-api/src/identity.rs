//! Identity provider access.
//!
//! The local user table mirrors users managed by a hosted identity provider.
//! [`ClerkClient`] fetches profiles from the Clerk Backend API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use quill_core::{Error, NewUser, Result};

/// An email address attached to a user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailAddress {
    #[serde(default)]
    pub id: Option<String>,
    pub email_address: String,
}

/// User profile as returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl IdentityUser {
    /// First listed email address.
    pub fn email(&self) -> Option<&str> {
        self.email_addresses
            .first()
            .map(|e| e.email_address.as_str())
    }

    /// First and last name joined with a space, `None` when both are blank.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }

    /// Values for the local user row.
    pub fn to_new_user(&self) -> NewUser {
        NewUser {
            id: self.id.clone(),
            email: self.email().map(str::to_string),
            full_name: self.full_name(),
        }
    }
}

/// Source of user profiles.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Fetch a profile. `Error::NotFound` for unknown ids.
    async fn get_user(&self, user_id: &str) -> Result<IdentityUser>;
}

/// Clerk Backend API client.
pub struct ClerkClient {
    client: reqwest::Client,
    api_url: String,
    secret_key: String,
}

impl ClerkClient {
    pub fn new(api_url: &str, secret_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| Error::Identity(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }
}

#[async_trait]
impl IdentityProvider for ClerkClient {
    async fn get_user(&self, user_id: &str) -> Result<IdentityUser> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(Error::InvalidInput(format!("Invalid user id: {}", user_id)));
        }

        let url = format!("{}/v1/users/{}", self.api_url, user_id);
        debug!(subsystem = "identity", component = "clerk", user_id, "Fetching user profile");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| Error::Identity(format!("Request failed: {}", e)))?;

        match response.status() {
            s if s.is_success() => response
                .json::<IdentityUser>()
                .await
                .map_err(|e| Error::Identity(format!("Failed to parse user: {}", e))),
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("User not found: {}", user_id))),
            status => {
                let body = response.text().await.unwrap_or_default();
                warn!(
                    subsystem = "identity",
                    component = "clerk",
                    status = status.as_u16(),
                    "Identity provider request failed"
                );
                Err(Error::Identity(format!(
                    "Identity provider returned {}: {}",
                    status, body
                )))
            }
        }
    }
}
