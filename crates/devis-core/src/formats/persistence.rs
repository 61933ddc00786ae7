//! # Persistence Format
//!
//! JSON serialization for persisted collections.
//!
//! The record collection and the user list are both stored as one
//! pretty-printed JSON array (two-space indent). File I/O lives in the
//! `store` and `users` modules; this module only maps bytes to values.
//!
//! ## Size Guard
//!
//! Payloads larger than `MAX_STORE_FILE_SIZE` are rejected before any
//! parsing is attempted.

use crate::primitives::MAX_STORE_FILE_SIZE;
use crate::{Devis, DevisError};
use serde::Serialize;
use serde::de::DeserializeOwned;

// =============================================================================
// GENERIC HELPERS
// =============================================================================

/// Serialize any value as pretty JSON bytes.
pub fn to_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, DevisError> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserialize a JSON array, treating blank input as an empty list.
pub fn list_from_json_bytes<T: DeserializeOwned>(bytes: &[u8]) -> Result<Vec<T>, DevisError> {
    if bytes.len() as u64 > MAX_STORE_FILE_SIZE {
        return Err(DevisError::Serialization(format!(
            "Payload size {} bytes exceeds maximum {} bytes",
            bytes.len(),
            MAX_STORE_FILE_SIZE
        )));
    }
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}

// =============================================================================
// RECORD COLLECTION
// =============================================================================

/// Serialize a record collection.
pub fn records_to_bytes(records: &[Devis]) -> Result<Vec<u8>, DevisError> {
    to_json_bytes(records)
}

/// Deserialize a record collection.
pub fn records_from_bytes(bytes: &[u8]) -> Result<Vec<Devis>, DevisError> {
    list_from_json_bytes(bytes)
}

// =============================================================================
// TESTS
// =============================================================================
