//! # Types Module
//!
//! Core type definitions for the devis engine.
//!
//! This module contains:
//! - The quote record (`Devis`) and its amount (`Montant`)
//! - Workflow status (`Statut`)
//! - Write-path input (`DevisInput`)
//! - Error types (`DevisError`)
//!
//! ## Persistence Compatibility
//!
//! Records are serialized in camelCase to stay readable by the dashboard
//! front-end. `statut` is kept as a plain string on the record itself so that
//! imported values outside the enum survive a load/save cycle; `Statut` is
//! what the normal write path validates against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// STATUT
// =============================================================================

/// Workflow status of a quote.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Statut {
    /// Under study. Default for new records.
    #[default]
    #[serde(rename = "En étude")]
    EnEtude,
    /// Validated by the insurer.
    #[serde(rename = "Validé")]
    Valide,
    /// Repair completed.
    #[serde(rename = "Terminé")]
    Termine,
}

impl Statut {
    /// All statuses, in dashboard display order.
    pub const ALL: [Statut; 3] = [Statut::EnEtude, Statut::Valide, Statut::Termine];

    /// The persisted label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EnEtude => "En étude",
            Self::Valide => "Validé",
            Self::Termine => "Terminé",
        }
    }
}

impl fmt::Display for Statut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statut {
    type Err = DevisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| DevisError::InvalidStatut(s.to_string()))
    }
}

// =============================================================================
// MONTANT
// =============================================================================

/// Monetary amount as it arrived: a JSON number or a free-form string.
///
/// The raw form is preserved on disk. Use [`Montant::amount`] whenever a
/// number is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Montant {
    Number(f64),
    Text(String),
}

impl Montant {
    /// Coerce to a finite, non-negative amount.
    ///
    /// Whitespace is trimmed and a comma is accepted as decimal separator.
    /// Empty, unparsable, negative or non-finite values yield `0.0`.
    #[must_use]
    pub fn amount(&self) -> f64 {
        let value = match self {
            Self::Number(n) => *n,
            Self::Text(s) => parse_amount(s).unwrap_or(0.0),
        };
        if value.is_finite() && value >= 0.0 {
            value
        } else {
            0.0
        }
    }

    /// Whether the value is acceptable on the normal write path: empty, or a
    /// finite non-negative number.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let parsed = match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) if s.trim().is_empty() => return true,
            Self::Text(s) => parse_amount(s),
        };
        parsed.is_some_and(|v| v.is_finite() && v >= 0.0)
    }

    /// Raw textual form, as written to CSV.
    #[must_use]
    pub fn raw(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }

    /// Whether the raw value is empty text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl Default for Montant {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<&str> for Montant {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Montant {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for Montant {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

fn parse_amount(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.replace(',', ".").parse::<f64>().ok()
}

// =============================================================================
// DEVIS RECORD
// =============================================================================

/// A repair-cost quote record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Devis {
    pub id: String,
    /// ISO 8601 calendar date (`YYYY-MM-DD`).
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub numero_sinistre: String,
    #[serde(default, rename = "numeroOR")]
    pub numero_or: String,
    #[serde(default)]
    pub garage: String,
    #[serde(default, deserialize_with = "nullable_montant")]
    pub montant: Montant,
    #[serde(default = "default_statut_label")]
    pub statut: String,
    #[serde(default)]
    pub commentaires: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `null` amounts load as empty text.
fn nullable_montant<'de, D>(deserializer: D) -> Result<Montant, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Montant>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_statut_label() -> String {
    Statut::default().as_str().to_string()
}

impl Devis {
    /// Parsed status, or `None` for values outside the enum.
    #[must_use]
    pub fn statut_enum(&self) -> Option<Statut> {
        self.statut.parse().ok()
    }
}

// =============================================================================
// WRITE INPUT
// =============================================================================

/// Fields accepted by create and update.
///
/// Every field is optional: create fills defaults, update keeps the stored
/// value for anything absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevisInput {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub numero_sinistre: Option<String>,
    #[serde(default, rename = "numeroOR")]
    pub numero_or: Option<String>,
    #[serde(default)]
    pub garage: Option<String>,
    #[serde(default)]
    pub montant: Option<Montant>,
    #[serde(default)]
    pub statut: Option<String>,
    #[serde(default)]
    pub commentaires: Option<String>,
}

impl DevisInput {
    /// Validate the status if one was supplied.
    pub fn validated_statut(&self) -> Result<Option<Statut>, DevisError> {
        self.statut
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .transpose()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the devis engine.
///
/// The CORE never panics on bad input; every failure is reported here.
#[derive(Debug, Error)]
pub enum DevisError {
    /// No record carries the requested id.
    #[error("Devis not found: {0}")]
    NotFound(String),

    /// A status outside the three workflow values was submitted.
    #[error("Invalid statut: {0:?}")]
    InvalidStatut(String),

    /// A write request failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An I/O error occurred on the persistence medium.
    #[error("I/O error: {0}")]
    Io(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// CSV input could not be read or output could not be written.
    #[error("CSV error: {0}")]
    Csv(String),

    /// Password hashing or verification failed.
    #[error("Password error: {0}")]
    Password(String),

    /// A user with that name already exists.
    #[error("User already exists: {0}")]
    UserExists(String),
}

impl From<std::io::Error> for DevisError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for DevisError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<csv::Error> for DevisError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

// =============================================================================
// TESTS
// =============================================================================
