//! # Authentication Module
//!
//! Cookie sessions and an optional API key for the devis HTTP API.
//!
//! ## Configuration
//!
//! - Accounts come from the users file (see `devis add-user`)
//! - `DEVIS_API_KEY`: if set, `Authorization: Bearer <key>` is accepted
//!   in place of a session cookie
//!
//! With no account and no API key, authentication is disabled and every
//! request acts as `anonymous`.
//!
//! ## Usage
//!
//! ```text
//! POST /api/auth/login  {"username": "...", "password": "..."}
//! Cookie: devis_session=<token>
//! ```

use super::{AppState, error::ApiError};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use subtle::ConstantTimeEq;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "devis_session";

/// Paths reachable without credentials.
pub const PUBLIC_PATHS: [&str; 4] = [
    "/health",
    "/api/auth/login",
    "/api/auth/check",
    "/api/auth/logout",
];

// =============================================================================
// PRINCIPAL
// =============================================================================

/// The acting principal, inserted into request extensions by the middleware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    /// Principal when authentication is disabled.
    pub const ANONYMOUS: &'static str = "anonymous";
    /// Principal for API-key requests.
    pub const API: &'static str = "api";

    pub fn name(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

struct SessionEntry {
    username: String,
    expires_at: Instant,
}

/// In-memory session table with a fixed lifetime per session.
pub struct SessionStore {
    sessions: HashMap<String, SessionEntry>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Open a session and return its token.
    pub fn create(&mut self, username: &str) -> String {
        self.purge_expired();
        let token = new_token();
        self.sessions.insert(
            token.clone(),
            SessionEntry {
                username: username.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        token
    }

    /// Username behind a live session.
    pub fn lookup(&self, token: &str) -> Option<&str> {
        self.sessions
            .get(token)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.username.as_str())
    }

    /// Close a session. Returns whether it existed.
    pub fn remove(&mut self, token: &str) -> bool {
        self.sessions.remove(token).is_some()
    }

    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.sessions.retain(|_, entry| entry.expires_at > now);
    }
}

/// 32 random bytes, URL-safe base64.
fn new_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

// =============================================================================
// COOKIES
// =============================================================================

/// Session token from the `Cookie` headers, if any.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// `Set-Cookie` value opening a session.
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

/// `Set-Cookie` value clearing the session.
pub fn clear_session_cookie() -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", SESSION_COOKIE)
}

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Get API key from environment variable.
///
/// Returns `Some(key)` if `DEVIS_API_KEY` is set and non-empty,
/// `None` otherwise.
pub fn get_api_key_from_env() -> Option<String> {
    std::env::var("DEVIS_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

/// Constant-time key comparison.
///
/// Both keys are padded to the same length so `ct_eq` always runs over the
/// same number of bytes.
pub fn keys_match(provided: &str, expected: &str) -> bool {
    let provided_bytes = provided.as_bytes();
    let expected_bytes = expected.as_bytes();

    let max_len = provided_bytes.len().max(expected_bytes.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided_bytes.len()].copy_from_slice(provided_bytes);
    padded_expected[..expected_bytes.len()].copy_from_slice(expected_bytes);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided_bytes.len() == expected_bytes.len()
}

// =============================================================================
// MIDDLEWARE
// =============================================================================

/// Authentication middleware.
///
/// Resolves the principal and stores it as a [`CurrentUser`] extension:
/// - public paths pass through untouched
/// - with authentication disabled, the principal is `anonymous`
/// - a valid bearer API key gives `api`
/// - a live session cookie gives the session's username
///
/// Anything else is 401.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return Ok(next.run(request).await);
    }

    if !state.auth_required() {
        request
            .extensions_mut()
            .insert(CurrentUser(CurrentUser::ANONYMOUS.to_string()));
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    if let (Some(expected), Some(header_value)) = (state.api_key(), auth_header.as_deref()) {
        let provided = header_value.strip_prefix("Bearer ").unwrap_or(header_value);
        if keys_match(provided, expected) {
            request
                .extensions_mut()
                .insert(CurrentUser(CurrentUser::API.to_string()));
            return Ok(next.run(request).await);
        }
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_api_key",
            path = %request.uri().path(),
            "Authentication failed: invalid API key"
        );
        return Err(ApiError::Unauthorized);
    }

    let username = match session_token(request.headers()) {
        Some(token) => state
            .sessions
            .read()
            .await
            .lookup(&token)
            .map(str::to_string),
        None => None,
    };

    match username {
        Some(username) => {
            request.extensions_mut().insert(CurrentUser(username));
            Ok(next.run(request).await)
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_or_expired_session",
                path = %request.uri().path(),
                "Authentication failed: no valid session"
            );
            Err(ApiError::Unauthorized)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
