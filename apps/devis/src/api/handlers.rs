//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    auth::{CurrentUser, clear_session_cookie, session_cookie, session_token},
    error::{ApiError, ApiResult},
    types::{
        AuthCheckResponse, DeleteResponse, HealthResponse, ImportResponse, ListParams,
        LoginRequest, LoginResponse, LogoutResponse,
    },
};
use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use devis_core::{DevisInput, DevisStats, QueryResult};

/// Body for an export of an empty collection.
pub const EMPTY_EXPORT_MESSAGE: &str = "Aucun devis à exporter";

/// Body for an import request without a `file` part.
pub const MISSING_FILE_MESSAGE: &str = "Aucun fichier fourni";

/// Download name of the CSV export.
pub const EXPORT_FILENAME: &str = "devis_export.csv";

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// AUTH HANDLERS
// =============================================================================

/// Check credentials and open a session.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Response> {
    let users = state.users.clone();
    let username = request.username.clone();

    // Argon2 verification is CPU-bound.
    let user = tokio::task::spawn_blocking(move || {
        users.authenticate(&request.username, &request.password)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Login task failed: {}", e)))??;

    let Some(user) = user else {
        tracing::warn!(
            event = "auth_failure",
            reason = "invalid_credentials",
            username = %username,
            "Login failed"
        );
        return Err(ApiError::Unauthorized);
    };

    let mut sessions = state.sessions.write().await;
    let token = sessions.create(&user.username);
    let cookie = session_cookie(&token, sessions.ttl());
    drop(sessions);

    tracing::info!(username = %user.username, "User logged in");

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse::success(user.username)),
    )
        .into_response())
}

/// Close the caller's session, if any, and clear the cookie.
pub async fn logout_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.write().await.remove(&token);
    }

    (
        StatusCode::OK,
        [(header::SET_COOKIE, clear_session_cookie())],
        Json(LogoutResponse { success: true }),
    )
        .into_response()
}

/// Report whether the caller holds a live session.
pub async fn check_handler(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let username = match session_token(&headers) {
        Some(token) => state
            .sessions
            .read()
            .await
            .lookup(&token)
            .map(str::to_string),
        None => None,
    };

    let response = match username {
        Some(name) => AuthCheckResponse::authenticated(name),
        None if !state.auth_required() => AuthCheckResponse::authenticated(CurrentUser::ANONYMOUS),
        None => AuthCheckResponse::anonymous(),
    };

    (StatusCode::OK, Json(response))
}

// =============================================================================
// RECORD HANDLERS
// =============================================================================

/// List records: filter, sort, paginate.
pub async fn list_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Json<QueryResult>> {
    let spec = params.to_query()?;
    Ok(Json(state.repo.list(&spec)?))
}

/// Fetch one record.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok((StatusCode::OK, Json(state.repo.get(&id)?)))
}

/// Create a record.
pub async fn create_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<DevisInput>,
) -> ApiResult<impl IntoResponse> {
    let devis = state.repo.create(input, user.name())?;
    tracing::info!(id = %devis.id, user = %user.name(), "Devis created");
    Ok((StatusCode::CREATED, Json(devis)))
}

/// Update the supplied fields of a record.
pub async fn update_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(input): Json<DevisInput>,
) -> ApiResult<impl IntoResponse> {
    let devis = state.repo.update(&id, input, user.name())?;
    tracing::info!(id = %devis.id, user = %user.name(), "Devis updated");
    Ok((StatusCode::OK, Json(devis)))
}

/// Delete a record.
pub async fn delete_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let removed = state.repo.delete(&id)?;
    tracing::info!(id = %removed.id, user = %user.name(), "Devis deleted");
    Ok((StatusCode::OK, Json(DeleteResponse::default())))
}

// =============================================================================
// STATS HANDLER
// =============================================================================

/// Aggregate statistics over every record.
pub async fn stats_handler(State(state): State<AppState>) -> ApiResult<Json<DevisStats>> {
    Ok(Json(state.repo.stats()?))
}

// =============================================================================
// CSV HANDLERS
// =============================================================================

/// Download every record as CSV.
pub async fn export_handler(State(state): State<AppState>) -> ApiResult<Response> {
    let Some(body) = state.repo.export_csv()? else {
        return Err(ApiError::NotFound(EMPTY_EXPORT_MESSAGE));
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", EXPORT_FILENAME),
            ),
        ],
        body,
    )
        .into_response())
}

/// Append the rows of an uploaded CSV file (multipart field `file`).
pub async fn import_handler(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> ApiResult<Json<ImportResponse>> {
    let mut file_content: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Lecture du formulaire impossible: {}", e)))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("Lecture du fichier impossible: {}", e)))?;
            file_content = Some(bytes.to_vec());
        }
    }

    let content = file_content.ok_or_else(|| ApiError::BadRequest(MISSING_FILE_MESSAGE.into()))?;

    let imported = state.repo.import_csv(&content, user.name())?;
    tracing::info!(rows = imported, user = %user.name(), "CSV import completed");

    Ok(Json(ImportResponse::new(imported)))
}
