//! # Users Module
//!
//! The small list of dashboard accounts.
//!
//! Accounts live in a JSON array keyed by username. Passwords are stored as
//! Argon2id PHC strings with a random per-user salt; plain passwords never
//! touch the disk.

use crate::formats::{list_from_json_bytes, to_json_bytes};
use crate::storage::{read_bounded, write_atomic};
use crate::DevisError;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Shortest accepted password.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// A stored account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Hash a password with Argon2id and a fresh salt.
pub fn hash_password(password: &str) -> Result<String, DevisError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| DevisError::Password(e.to_string()))
}

/// Check a password against a stored PHC string.
///
/// A malformed stored hash is an error; a wrong password is `Ok(false)`.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, DevisError> {
    let parsed = PasswordHash::new(stored).map_err(|e| DevisError::Password(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Account list backed by one JSON file.
#[derive(Debug, Clone)]
pub struct UserStore {
    path: PathBuf,
}

impl UserStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every account. A missing file means no accounts.
    pub fn load(&self) -> Result<Vec<User>, DevisError> {
        match read_bounded(&self.path)? {
            Some(bytes) => list_from_json_bytes(&bytes),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, users: &[User]) -> Result<(), DevisError> {
        write_atomic(&self.path, &to_json_bytes(users)?)
    }

    /// Add an account.
    pub fn add_user(&self, username: &str, password: &str) -> Result<User, DevisError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DevisError::Validation("username must not be empty".to_string()));
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(DevisError::Validation(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        let mut users = self.load()?;
        if users.iter().any(|u| u.username == username) {
            return Err(DevisError::UserExists(username.to_string()));
        }

        let user = User {
            username: username.to_string(),
            password_hash: hash_password(password)?,
            created_at: Some(Utc::now()),
        };
        users.push(user.clone());
        self.save(&users)?;
        Ok(user)
    }

    /// Check credentials. `Ok(None)` for an unknown user or a wrong password.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, DevisError> {
        let Some(user) = self.load()?.into_iter().find(|u| u.username == username) else {
            return Ok(None);
        };
        if verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
