//! # API Errors
//!
//! Maps engine errors onto HTTP status codes and `{"error": "..."}` bodies.

use super::types::ErrorResponse;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use devis_core::DevisError;

/// Body for an unknown record id.
pub const NOT_FOUND_MESSAGE: &str = "Devis non trouvé";

/// Body for any failure whose detail stays in the logs.
pub const INTERNAL_MESSAGE: &str = "Erreur interne du serveur";

/// Body for a request without valid credentials.
pub const UNAUTHORIZED_MESSAGE: &str = "Non authentifié";

/// Errors returned by handlers and middleware.
#[derive(Debug)]
pub enum ApiError {
    /// An engine error, mapped by kind.
    Core(DevisError),
    /// 400 with the given message.
    BadRequest(String),
    /// 401.
    Unauthorized,
    /// 404 with the given message.
    NotFound(&'static str),
    /// 500; the detail is logged, not returned.
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DevisError> for ApiError {
    fn from(err: DevisError) -> Self {
        Self::Core(err)
    }
}

impl ApiError {
    /// Status code and client-facing message.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Core(DevisError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, NOT_FOUND_MESSAGE.to_string())
            }
            Self::Core(
                e @ (DevisError::InvalidStatut(_) | DevisError::Validation(_) | DevisError::Csv(_)),
            ) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Core(_) | Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_MESSAGE.to_string(),
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, (*msg).to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            match &self {
                Self::Core(e) => tracing::error!(error = %e, "Request failed"),
                Self::Internal(detail) => tracing::error!(error = %detail, "Request failed"),
                _ => {}
            }
        }
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================
