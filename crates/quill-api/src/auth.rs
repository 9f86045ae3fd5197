//! Session token verification and the authenticated-user extractor.
//!
//! Session tokens are HS256 JWTs minted by the identity provider from a JWT
//! template signed with a shared secret. The `sub` claim is the user id.
//! Clients send the token either as `Authorization: Bearer <token>` or in
//! the `__session` cookie.

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use quill_core::defaults::{SESSION_COOKIE, TOKEN_LEEWAY_SECS};
use quill_core::{Error, Result};

use crate::{ApiError, AppState};

type HmacSha256 = Hmac<Sha256>;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Identity-provider session id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

impl SessionClaims {
    /// Claims for `user_id` valid until `exp`.
    pub fn new(user_id: impl Into<String>, exp: i64) -> Self {
        Self {
            sub: user_id.into(),
            exp,
            nbf: None,
            iat: None,
            sid: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

/// Verifies HS256 session tokens against a shared secret.
pub struct SessionVerifier {
    secret: Vec<u8>,
    leeway_secs: i64,
}

impl SessionVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            leeway_secs: TOKEN_LEEWAY_SECS,
        }
    }

    /// Clock skew tolerated on `exp` and `nbf`.
    pub fn with_leeway(mut self, secs: i64) -> Self {
        self.leeway_secs = secs;
        self
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| Error::Internal(format!("Invalid HMAC key: {}", e)))
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    /// Verify a token as of `now` (seconds since the Unix epoch).
    pub fn verify_at(&self, token: &str, now: i64) -> Result<SessionClaims> {
        let invalid =
            |reason: &str| Error::Unauthorized(format!("Invalid session token: {}", reason));

        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("malformed"));
        };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| invalid("bad header encoding"))?;
        let header: JwtHeader =
            serde_json::from_slice(&header_json).map_err(|_| invalid("bad header"))?;
        if header.alg != "HS256" {
            return Err(invalid("unsupported algorithm"));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| invalid("bad signature encoding"))?;
        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| invalid("signature mismatch"))?;

        let payload = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| invalid("bad payload encoding"))?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| invalid("bad claims"))?;

        if claims.exp + self.leeway_secs < now {
            return Err(invalid("expired"));
        }
        if let Some(nbf) = claims.nbf {
            if nbf - self.leeway_secs > now {
                return Err(invalid("not yet valid"));
            }
        }
        if claims.sub.is_empty() {
            return Err(invalid("missing subject"));
        }

        Ok(claims)
    }

    /// Mint a token for `claims`. Used by tests and local tooling.
    pub fn sign(&self, claims: &SessionClaims) -> Result<String> {
        let header = JwtHeader {
            alg: "HS256".to_string(),
            typ: Some("JWT".to_string()),
        };
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);

        let mut mac = self.mac()?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        let signature_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}.{}", header_b64, payload_b64, signature_b64))
    }
}

/// Pull the session token from the bearer header, falling back to the
/// session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Extractor that requires a valid session.
///
/// ```ignore
/// async fn my_handler(user: RequireUser) -> impl IntoResponse {
///     format!("hello {}", user.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireUser {
    pub user_id: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for RequireUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> std::result::Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".to_string()))?;

        let claims = state.sessions.verify(&token).map_err(|e| {
            debug!(error = %e, "Session token rejected");
            ApiError::Unauthorized("Unauthorized".to_string())
        })?;

        Ok(RequireUser {
            user_id: claims.sub,
        })
    }
}
