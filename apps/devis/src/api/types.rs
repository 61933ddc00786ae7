//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use devis_core::{DevisError, DevisQuery, SortOrder, SortSpec};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

// =============================================================================
// LIST PARAMETERS
// =============================================================================

/// Query string of `GET /api/devis`.
///
/// Numbers arrive as text; anything that does not parse falls back to the
/// default rather than rejecting the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub statut: Option<String>,
    #[serde(default, alias = "dateFrom")]
    pub date_debut: Option<String>,
    #[serde(default, alias = "dateTo")]
    pub date_fin: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub limit: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
}

impl ListParams {
    /// Build the engine query.
    ///
    /// An unknown `sort` field or `order` is a validation error; `order`
    /// without `sort` is ignored.
    pub fn to_query(&self) -> Result<DevisQuery, DevisError> {
        let page = parse_number(self.page.as_deref()).map_or(1, |p| p.max(1) as usize);
        let limit = parse_number(self.limit.as_deref()).map_or(0, |l| l.max(0) as usize);

        let mut query = DevisQuery::new()
            .date_range(self.date_debut.clone(), self.date_fin.clone())
            .page(page, limit);
        query.search = self.search.clone();
        query.statut = self.statut.clone();

        if let Some(field) = self.sort.as_deref().filter(|s| !s.is_empty()) {
            let order = match self.order.as_deref().filter(|s| !s.is_empty()) {
                Some(o) => o.parse()?,
                None => SortOrder::default(),
            };
            query = query.sorted(SortSpec::new(field.parse()?, order));
        }

        Ok(query)
    }
}

fn parse_number(value: Option<&str>) -> Option<i64> {
    value.and_then(|v| v.trim().parse().ok())
}

// =============================================================================
// AUTH REQUEST/RESPONSE
// =============================================================================

/// Login request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Public view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub username: String,
}

/// Successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: UserInfo,
}

impl LoginResponse {
    pub fn success(username: impl Into<String>) -> Self {
        Self {
            success: true,
            user: UserInfo {
                username: username.into(),
            },
        }
    }
}

/// Logout acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogoutResponse {
    pub success: bool,
}

/// Session probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCheckResponse {
    pub authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

impl AuthCheckResponse {
    pub fn authenticated(username: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            user: Some(UserInfo {
                username: username.into(),
            }),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            authenticated: false,
            user: None,
        }
    }
}

// =============================================================================
// WRITE RESPONSES
// =============================================================================

/// Delete acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub message: String,
}

impl Default for DeleteResponse {
    fn default() -> Self {
        Self {
            message: "Devis supprimé avec succès".to_string(),
        }
    }
}

/// Import result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub message: String,
    pub imported: usize,
}

impl ImportResponse {
    pub fn new(imported: usize) -> Self {
        Self {
            message: format!("{} devis importés avec succès", imported),
            imported,
        }
    }
}
