//! # Configuration
//!
//! Server settings read from an optional TOML file.
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 3000
//! data_file = "data/devis.json"
//! users_file = "data/users.json"
//! max_upload_bytes = 5242880
//! session_ttl_secs = 86400
//! ```
//!
//! Every key is optional. CLI flags override the file, and the
//! per-concern environment variables (`DEVIS_SESSION_TTL_SECS`, ...)
//! override both.

use devis_core::DevisError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default request body limit: 5 MiB (CSV uploads).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Maximum size of the configuration file itself.
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// APP CONFIG
// =============================================================================

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub data_file: PathBuf,
    pub users_file: PathBuf,
    pub max_upload_bytes: usize,
    pub session_ttl_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            data_file: PathBuf::from("data/devis.json"),
            users_file: PathBuf::from("data/users.json"),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, DevisError> {
        toml::from_str(text).map_err(|e| DevisError::Serialization(format!("Config: {}", e)))
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> Result<Self, DevisError> {
        let metadata = std::fs::metadata(path).map_err(|e| {
            DevisError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(DevisError::Serialization(format!(
                "Config file size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(path).map_err(|e| {
            DevisError::Io(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Defaults when no file is given, otherwise the file's content.
    pub fn from_optional(path: Option<&Path>) -> Result<Self, DevisError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Session lifetime, with `DEVIS_SESSION_TTL_SECS` taking precedence.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(get_session_ttl_from_env().unwrap_or(self.session_ttl_secs))
    }

    /// `host:port` for binding.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Session TTL from `DEVIS_SESSION_TTL_SECS`, if set to a positive integer.
pub fn get_session_ttl_from_env() -> Option<u64> {
    std::env::var("DEVIS_SESSION_TTL_SECS")
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .filter(|secs| *secs > 0)
}

// =============================================================================
// TESTS
// =============================================================================
