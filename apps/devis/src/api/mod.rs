//! # Devis HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/auth/login` - Open a session
//! - `POST /api/auth/logout` - Close the session
//! - `GET /api/auth/check` - Session probe
//! - `GET /api/devis` - Filtered, sorted, paginated listing
//! - `POST /api/devis` - Create a record
//! - `GET|PUT|DELETE /api/devis/{id}` - Read, update, delete one record
//! - `GET /api/stats` - Aggregate statistics
//! - `GET /api/export/csv` - CSV download
//! - `POST /api/import/csv` - CSV upload (multipart field `file`)
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `DEVIS_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `DEVIS_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `DEVIS_API_KEY`: If set, accepts `Authorization: Bearer <key>`
//! - `DEVIS_SESSION_TTL_SECS`: Session lifetime (default: 24 hours)

mod auth;
mod error;
mod handlers;
mod middleware;
mod types;

pub use auth::{
    CurrentUser, PUBLIC_PATHS, SESSION_COOKIE, SessionStore, get_api_key_from_env, keys_match,
};
pub use error::{ApiError, ApiResult, INTERNAL_MESSAGE, NOT_FOUND_MESSAGE, UNAUTHORIZED_MESSAGE};
pub use handlers::{EMPTY_EXPORT_MESSAGE, EXPORT_FILENAME, MISSING_FILE_MESSAGE};
pub use middleware::{GlobalRateLimiter, create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    AuthCheckResponse, DeleteResponse, ErrorResponse, HealthResponse, ImportResponse, ListParams,
    LoginRequest, LoginResponse, LogoutResponse, UserInfo,
};

use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, DEFAULT_SESSION_TTL_SECS};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use devis_core::{DevisError, DevisRepository, UserStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    /// The record repository.
    pub repo: Arc<DevisRepository>,
    /// Account list for login.
    pub users: Arc<UserStore>,
    /// Live sessions.
    pub sessions: Arc<RwLock<SessionStore>>,
    api_key: Option<Arc<str>>,
    auth_enabled: Arc<AtomicBool>,
    body_limit: usize,
}

impl AppState {
    /// Create app state.
    ///
    /// Reads `DEVIS_API_KEY`. With no key, authentication turns on as soon
    /// as the account list holds an account (see [`AppState::auth_required`]).
    pub fn new(repo: DevisRepository, users: UserStore) -> Self {
        let api_key = get_api_key_from_env();

        let state = Self {
            repo: Arc::new(repo),
            users: Arc::new(users),
            sessions: Arc::new(RwLock::new(SessionStore::new(Duration::from_secs(
                DEFAULT_SESSION_TTL_SECS,
            )))),
            auth_enabled: Arc::new(AtomicBool::new(api_key.is_some())),
            api_key: api_key.map(Arc::from),
            body_limit: DEFAULT_MAX_UPLOAD_BYTES,
        };
        state.auth_required();
        state
    }

    /// Replace the session lifetime.
    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.sessions = Arc::new(RwLock::new(SessionStore::new(ttl)));
        self
    }

    /// Replace the request body limit.
    #[must_use]
    pub fn with_body_limit(mut self, bytes: usize) -> Self {
        self.body_limit = bytes;
        self
    }

    /// Whether requests must carry credentials.
    ///
    /// Once on, authentication stays on for the life of the server. While
    /// it is off, the account list is re-read on every call so an account
    /// added with `devis add-user` takes effect without a restart. An
    /// unreadable account list turns authentication on.
    pub fn auth_required(&self) -> bool {
        if self.auth_enabled.load(Ordering::Acquire) {
            return true;
        }
        let has_users = match self.users.load() {
            Ok(list) => !list.is_empty(),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %self.users.path().display(),
                    "Cannot read users file; authentication enabled"
                );
                true
            }
        };
        if has_users {
            self.auth_enabled.store(true, Ordering::Release);
            tracing::info!("Account found; authentication enabled");
        }
        has_users
    }

    /// Configured API key, if any.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build CORS layer from environment configuration.
///
/// Reads `DEVIS_CORS_ORIGINS`:
/// - `*`: allows all origins (development only)
/// - not set: localhost only
/// - otherwise: a comma-separated list of origins
///
/// Explicit origin lists allow credentials so the session cookie travels.
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("DEVIS_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (DEVIS_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in DEVIS_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                cors_for(allowed_origins)
            }
        }
        None => {
            tracing::info!("CORS: No DEVIS_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    cors_for(origins)
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit - caps uploads
/// 4. Rate Limiting - protects against floods (if enabled)
/// 5. Authentication - resolves the acting principal
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    if state.auth_required() {
        tracing::info!(
            api_key = state.api_key().is_some(),
            "Authentication enabled"
        );
    } else {
        tracing::warn!(
            "Authentication DISABLED - no user account and no DEVIS_API_KEY; \
             every endpoint is publicly accessible until an account is created with `devis add-user`."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/auth/login", post(handlers::login_handler))
        .route("/api/auth/logout", post(handlers::logout_handler))
        .route("/api/auth/check", get(handlers::check_handler))
        .route(
            "/api/devis",
            get(handlers::list_handler).post(handlers::create_handler),
        )
        .route(
            "/api/devis/{id}",
            get(handlers::get_handler)
                .put(handlers::update_handler)
                .delete(handlers::delete_handler),
        )
        .route("/api/stats", get(handlers::stats_handler))
        .route("/api/export/csv", get(handlers::export_handler))
        .route("/api/import/csv", post(handlers::import_handler))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ));

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    let body_limit = state.body_limit;
    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), DevisError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| DevisError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Devis HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| DevisError::Io(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
