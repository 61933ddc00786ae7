//! Integration tests for the devis HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
// Allow holding MutexGuard across await in auth tests - tests are serialized
// intentionally to avoid env var conflicts
#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use devis::api::{
    AppState, AuthCheckResponse, DeleteResponse, ErrorResponse, HealthResponse, ImportResponse,
    LoginResponse, create_router,
};
use devis_core::{Devis, DevisRepository, DevisStats, MemoryStore, QueryResult, UserStore};
use serde_json::json;
use std::sync::Mutex;
use tempfile::TempDir;

/// Mutex to serialize tests since they read and modify env vars.
static AUTH_TEST_MUTEX: Mutex<()> = Mutex::new(());

const ENV_VARS: [&str; 3] = ["DEVIS_API_KEY", "DEVIS_RATE_LIMIT", "DEVIS_CORS_ORIGINS"];

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Guard wrapper that holds the mutex and the temp dir, and cleans env vars on drop.
struct TestGuard {
    _dir: TempDir,
    _guard: std::sync::MutexGuard<'static, ()>,
}

impl Drop for TestGuard {
    fn drop(&mut self) {
        for var in ENV_VARS {
            // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
            unsafe { std::env::remove_var(var) };
        }
    }
}

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    let guard = AUTH_TEST_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    for var in ENV_VARS {
        // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
        unsafe { std::env::remove_var(var) };
    }
    guard
}

fn record(id: &str, date: &str, garage: &str, montant: &str, statut: &str) -> Devis {
    serde_json::from_value(json!({
        "id": id,
        "date": date,
        "numeroSinistre": format!("SIN-{}", id),
        "numeroOR": format!("OR-{}", id),
        "garage": garage,
        "montant": montant,
        "statut": statut,
        "commentaires": ""
    }))
    .unwrap()
}

fn three_records() -> Vec<Devis> {
    vec![
        record("a", "2024-01-10", "Garage Nord", "100", "En étude"),
        record("b", "2024-02-20", "Carrosserie Sud", "50.5", "Validé"),
        record("c", "2024-03-30", "Garage Est", "0", "Terminé"),
    ]
}

/// Build a server over the given records, with `users` accounts created first.
/// Env vars must be set by the caller before this runs.
fn build_server(
    guard: std::sync::MutexGuard<'static, ()>,
    records: Vec<Devis>,
    users: &[(&str, &str)],
) -> (TestServer, TestGuard) {
    let dir = tempfile::tempdir().unwrap();
    let user_store = UserStore::new(dir.path().join("users.json"));
    for (name, password) in users {
        user_store.add_user(name, password).unwrap();
    }

    let repo = DevisRepository::new(MemoryStore::with_records(records));
    let state = AppState::new(repo, user_store);
    let router = create_router(state);
    (
        TestServer::new(router).unwrap(),
        TestGuard {
            _dir: dir,
            _guard: guard,
        },
    )
}

/// Create a test server with no authentication over the three sample records.
fn create_populated_test_server() -> (TestServer, TestGuard) {
    build_server(lock_env(), three_records(), &[])
}

/// Create a test server over an empty collection.
fn create_test_server() -> (TestServer, TestGuard) {
    build_server(lock_env(), Vec::new(), &[])
}

/// Create a test server requiring the given API key.
fn create_api_key_server(api_key: &str) -> (TestServer, TestGuard) {
    let guard = lock_env();
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("DEVIS_API_KEY", api_key) };
    build_server(guard, three_records(), &[])
}

fn multipart_body(boundary: &str, field: &str, content: &str) -> Vec<u8> {
    format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"devis.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n{c}\r\n--{b}--\r\n",
        b = boundary,
        f = field,
        c = content
    )
    .into_bytes()
}

fn cookie_pair(set_cookie: &HeaderValue) -> HeaderValue {
    let raw = set_cookie.to_str().unwrap();
    raw.split(';').next().unwrap().parse().unwrap()
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _guard) = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// LIST ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_list_returns_envelope_in_stored_order() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/api/devis").await;

    response.assert_status_ok();
    let result: QueryResult = response.json();
    let ids: Vec<&str> = result.data.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(result.pagination.page, 1);
    assert_eq!(result.pagination.limit, 10);
    assert_eq!(result.pagination.total, 3);
    assert_eq!(result.pagination.total_pages, 1);
}

#[tokio::test]
async fn test_list_pagination_field_names() {
    let (server, _guard) = create_populated_test_server();

    let body: serde_json::Value = server.get("/api/devis?page=1&limit=2").await.json();

    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"][0]["numeroOR"], "OR-a");
}

#[tokio::test]
async fn test_list_filters_by_statut() {
    let (server, _guard) = create_populated_test_server();

    let result: QueryResult = server.get("/api/devis?statut=Valid%C3%A9").await.json();
    assert_eq!(result.pagination.total, 1);
    assert_eq!(result.data[0].id, "b");

    let all: QueryResult = server.get("/api/devis?statut=tous&search=").await.json();
    assert_eq!(all.pagination.total, 3);
}

#[tokio::test]
async fn test_list_search_is_case_insensitive() {
    let (server, _guard) = create_populated_test_server();

    let result: QueryResult = server.get("/api/devis?search=GARAGE").await.json();

    let ids: Vec<&str> = result.data.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);
}

#[tokio::test]
async fn test_list_date_range_and_aliases() {
    let (server, _guard) = create_populated_test_server();

    let french: QueryResult = server
        .get("/api/devis?dateDebut=2024-02-01&dateFin=2024-03-30")
        .await
        .json();
    let english: QueryResult = server
        .get("/api/devis?dateFrom=2024-02-01&dateTo=2024-03-30")
        .await
        .json();

    assert_eq!(french.pagination.total, 2);
    assert_eq!(french, english);
}

#[tokio::test]
async fn test_list_page_beyond_end_is_empty() {
    let (server, _guard) = create_populated_test_server();

    let result: QueryResult = server.get("/api/devis?page=9&limit=2").await.json();

    assert!(result.data.is_empty());
    assert_eq!(result.pagination.total, 3);
    assert_eq!(result.pagination.total_pages, 2);
}

#[tokio::test]
async fn test_list_unparsable_numbers_fall_back() {
    let (server, _guard) = create_populated_test_server();

    let result: QueryResult = server.get("/api/devis?page=abc&limit=-4").await.json();

    assert_eq!(result.pagination.page, 1);
    assert_eq!(result.pagination.limit, 10);
    assert_eq!(result.data.len(), 3);
}

#[tokio::test]
async fn test_list_sorted_by_montant_desc() {
    let (server, _guard) = create_populated_test_server();

    let result: QueryResult = server.get("/api/devis?sort=montant&order=desc").await.json();

    let ids: Vec<&str> = result.data.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let asc: QueryResult = server.get("/api/devis?sort=montant").await.json();
    let ids: Vec<&str> = asc.data.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_list_unknown_sort_field_rejected() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/api/devis?sort=couleur").await;

    response.assert_status_bad_request();
    let error: ErrorResponse = response.json();
    assert!(error.error.contains("couleur"));
}

// =============================================================================
// SINGLE RECORD TESTS
// =============================================================================

#[tokio::test]
async fn test_get_by_id() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/api/devis/b").await;

    response.assert_status_ok();
    let devis: Devis = response.json();
    assert_eq!(devis.garage, "Carrosserie Sud");
}

#[tokio::test]
async fn test_get_unknown_id_is_404() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/api/devis/zzz").await;

    response.assert_status_not_found();
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "Devis non trouvé");
}

#[tokio::test]
async fn test_create_applies_defaults() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/api/devis")
        .json(&json!({
            "numeroSinistre": "SIN-77",
            "numeroOR": "OR-77",
            "garage": "Garage Ouest",
            "montant": "1250,00"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let devis: Devis = response.json();
    assert!(!devis.id.is_empty());
    assert_eq!(devis.statut, "En étude");
    assert_eq!(devis.date.len(), 10);
    assert_eq!(devis.commentaires, "");
    assert_eq!(devis.created_by.as_deref(), Some("anonymous"));
    assert!(devis.created_at.is_some());

    let listed: QueryResult = server.get("/api/devis").await.json();
    assert_eq!(listed.pagination.total, 1);
}

#[tokio::test]
async fn test_create_keeps_numeric_montant() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/api/devis")
        .json(&json!({ "garage": "G", "montant": 320.5, "statut": "Validé" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["montant"], 320.5);
    assert_eq!(body["statut"], "Validé");
}

#[tokio::test]
async fn test_create_invalid_statut_rejected() {
    let (server, _guard) = create_test_server();

    let response = server
        .post("/api/devis")
        .json(&json!({ "garage": "G", "statut": "Perdu" }))
        .await;

    response.assert_status_bad_request();
    let listed: QueryResult = server.get("/api/devis").await.json();
    assert_eq!(listed.pagination.total, 0);
}

#[tokio::test]
async fn test_create_invalid_montant_or_date_rejected() {
    let (server, _guard) = create_test_server();

    server
        .post("/api/devis")
        .json(&json!({ "montant": "beaucoup" }))
        .await
        .assert_status_bad_request();
    server
        .post("/api/devis")
        .json(&json!({ "date": "02/05/2024" }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_update_merges_supplied_fields() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .put("/api/devis/a")
        .json(&json!({ "statut": "Terminé", "commentaires": "réparé" }))
        .await;

    response.assert_status_ok();
    let devis: Devis = response.json();
    assert_eq!(devis.id, "a");
    assert_eq!(devis.garage, "Garage Nord");
    assert_eq!(devis.statut, "Terminé");
    assert_eq!(devis.commentaires, "réparé");
    assert_eq!(devis.updated_by.as_deref(), Some("anonymous"));
}

#[tokio::test]
async fn test_update_unknown_id_is_404() {
    let (server, _guard) = create_populated_test_server();

    let response = server
        .put("/api/devis/zzz")
        .json(&json!({ "garage": "X" }))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_delete_then_404() {
    let (server, _guard) = create_populated_test_server();

    let response = server.delete("/api/devis/a").await;
    response.assert_status_ok();
    let body: DeleteResponse = response.json();
    assert_eq!(body.message, "Devis supprimé avec succès");

    server.get("/api/devis/a").await.assert_status_not_found();
    server.delete("/api/devis/a").await.assert_status_not_found();

    let listed: QueryResult = server.get("/api/devis").await.json();
    assert_eq!(listed.pagination.total, 2);
}

// =============================================================================
// STATS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_stats_shape_and_values() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/api/stats").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["enEtude"], 1);
    assert_eq!(body["valides"], 1);
    assert_eq!(body["termines"], 1);

    let stats: DevisStats = response.json();
    assert!((stats.montant_total - 150.5).abs() < 1e-9);
    assert!((stats.montant_moyen - 150.5 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_stats_empty_collection() {
    let (server, _guard) = create_test_server();

    let stats: DevisStats = server.get("/api/stats").await.json();

    assert_eq!(stats.total, 0);
    assert_eq!(stats.montant_moyen, 0.0);
}

// =============================================================================
// CSV ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_export_headers_and_body() {
    let (server, _guard) = create_populated_test_server();

    let response = server.get("/api/export/csv").await;

    response.assert_status_ok();
    let headers = response.headers();
    assert_eq!(
        headers.get(header::CONTENT_TYPE).unwrap(),
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        headers.get(header::CONTENT_DISPOSITION).unwrap(),
        "attachment; filename=devis_export.csv"
    );

    let text = response.text();
    assert!(text.starts_with('\u{feff}'));
    let lines: Vec<&str> = text.trim_start_matches('\u{feff}').lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].contains("numeroSinistre"));
}

#[tokio::test]
async fn test_export_empty_collection_is_404() {
    let (server, _guard) = create_test_server();

    let response = server.get("/api/export/csv").await;

    response.assert_status_not_found();
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "Aucun devis à exporter");
}

#[tokio::test]
async fn test_import_multipart_appends_rows() {
    let (server, _guard) = create_populated_test_server();
    let boundary = "devis-test-boundary";
    let csv = "\u{feff}Date;N° de Sinistre;N° OR;Garage;Montant;Statut;Commentaires\n\
               2024-05-02;S-1;OR-1;Garage Nord;120;Validé;\n\
               2024-05-03;S-2;OR-2;Garage Sud;;;à revoir\n";

    let response = server
        .post("/api/import/csv")
        .bytes(bytes::Bytes::from(multipart_body(boundary, "file", csv)))
        .content_type(&format!("multipart/form-data; boundary={}", boundary))
        .await;

    response.assert_status_ok();
    let body: ImportResponse = response.json();
    assert_eq!(body.imported, 2);
    assert_eq!(body.message, "2 devis importés avec succès");

    let listed: QueryResult = server.get("/api/devis?limit=10").await.json();
    assert_eq!(listed.pagination.total, 5);
    let last = &listed.data[4];
    assert_eq!(last.statut, "En étude");
    assert_eq!(last.commentaires, "à revoir");
    assert_eq!(last.created_by.as_deref(), Some("anonymous"));
}

#[tokio::test]
async fn test_import_without_file_part_rejected() {
    let (server, _guard) = create_test_server();
    let boundary = "devis-test-boundary";

    let response = server
        .post("/api/import/csv")
        .bytes(bytes::Bytes::from(multipart_body(boundary, "other", "a;b\n")))
        .content_type(&format!("multipart/form-data; boundary={}", boundary))
        .await;

    response.assert_status_bad_request();
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "Aucun fichier fourni");
}

// =============================================================================
// API KEY AUTHENTICATION TESTS
// =============================================================================

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let (server, _guard) = create_api_key_server("test-secret-key-12345");

    let response = server.get("/api/devis").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    let error: ErrorResponse = response.json();
    assert_eq!(error.error, "Non authentifié");
}

#[tokio::test]
async fn test_api_key_valid_bearer_token() {
    let api_key = "test-secret-key-12345";
    let (server, _guard) = create_api_key_server(api_key);

    let response = server
        .post("/api/devis")
        .add_header(
            header::AUTHORIZATION,
            format!("Bearer {}", api_key).parse::<HeaderValue>().unwrap(),
        )
        .json(&json!({ "garage": "Via API" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let devis: Devis = response.json();
    assert_eq!(devis.created_by.as_deref(), Some("api"));
}

#[tokio::test]
async fn test_api_key_invalid_token_rejected() {
    let (server, _guard) = create_api_key_server("correct-key");

    let response = server
        .get("/api/stats")
        .add_header(
            header::AUTHORIZATION,
            "Bearer wrong-key".parse::<HeaderValue>().unwrap(),
        )
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_is_public_with_auth() {
    let (server, _guard) = create_api_key_server("correct-key");

    server.get("/health").await.assert_status_ok();
    let check: AuthCheckResponse = server.get("/api/auth/check").await.json();
    assert!(!check.authenticated);
}

// =============================================================================
// SESSION AUTHENTICATION TESTS
// =============================================================================

#[tokio::test]
async fn test_login_session_logout_flow() {
    let (server, _guard) = build_server(lock_env(), three_records(), &[("claire", "motdepasse")]);

    // Protected without a session
    server
        .get("/api/devis")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Wrong password
    server
        .post("/api/auth/login")
        .json(&json!({ "username": "claire", "password": "mauvais!" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    // Good password
    let login = server
        .post("/api/auth/login")
        .json(&json!({ "username": "claire", "password": "motdepasse" }))
        .await;
    login.assert_status_ok();
    let body: LoginResponse = login.json();
    assert!(body.success);
    assert_eq!(body.user.username, "claire");

    let set_cookie = login.headers().get(header::SET_COOKIE).unwrap().clone();
    let raw = set_cookie.to_str().unwrap();
    assert!(raw.starts_with("devis_session="));
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Lax"));
    let cookie = cookie_pair(&set_cookie);

    // Session works and stamps the username
    let created = server
        .post("/api/devis")
        .add_header(header::COOKIE, cookie.clone())
        .json(&json!({ "garage": "Garage Claire" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let devis: Devis = created.json();
    assert_eq!(devis.created_by.as_deref(), Some("claire"));

    let check: AuthCheckResponse = server
        .get("/api/auth/check")
        .add_header(header::COOKIE, cookie.clone())
        .await
        .json();
    assert!(check.authenticated);
    assert_eq!(check.user.unwrap().username, "claire");

    // Logout clears the session
    let logout = server
        .post("/api/auth/logout")
        .add_header(header::COOKIE, cookie.clone())
        .await;
    logout.assert_status_ok();
    let cleared = logout.headers().get(header::SET_COOKIE).unwrap();
    assert!(cleared.to_str().unwrap().contains("Max-Age=0"));

    server
        .get("/api/devis")
        .add_header(header::COOKIE, cookie)
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_check_reports_anonymous_when_auth_disabled() {
    let (server, _guard) = create_test_server();

    let check: AuthCheckResponse = server.get("/api/auth/check").await.json();

    assert!(check.authenticated);
    assert_eq!(check.user.unwrap().username, "anonymous");
}

#[tokio::test]
async fn test_account_added_while_running_enables_auth() {
    let _env = lock_env();
    let dir = tempfile::tempdir().unwrap();
    let users_path = dir.path().join("users.json");
    let repo = DevisRepository::new(MemoryStore::with_records(three_records()));
    let server =
        TestServer::new(create_router(AppState::new(repo, UserStore::new(&users_path)))).unwrap();

    server.get("/api/devis").await.assert_status_ok();

    // Same file, written from outside the server, as `devis add-user` does
    UserStore::new(&users_path)
        .add_user("claire", "motdepasse")
        .unwrap();

    server
        .get("/api/devis")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .post("/api/devis")
        .json(&json!({ "garage": "Garage Intrus" }))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    let check: AuthCheckResponse = server.get("/api/auth/check").await.json();
    assert!(!check.authenticated);

    server
        .post("/api/auth/login")
        .json(&json!({ "username": "claire", "password": "motdepasse" }))
        .await
        .assert_status_ok();
}

// =============================================================================
// RATE LIMIT TESTS
// =============================================================================

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let guard = lock_env();
    // SAFETY: Tests run sequentially under AUTH_TEST_MUTEX, so no concurrent env access.
    unsafe { std::env::set_var("DEVIS_RATE_LIMIT", "1") };
    let (server, _guard) = build_server(guard, Vec::new(), &[]);

    server.get("/health").await.assert_status_ok();
    let response = server.get("/health").await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);
}
