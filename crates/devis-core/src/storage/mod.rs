//! # Storage Module
//!
//! Whole-collection persistence backends.
//!
//! A store only knows how to load and save the complete record collection
//! in one shot; there is no partial or streaming access. Two backends:
//!
//! - `JsonFileStore`: one JSON array on disk
//! - `MemoryStore`: volatile, for tests and throwaway runs

mod json_file;

pub use json_file::JsonFileStore;
pub(crate) use json_file::{read_bounded, write_atomic};

use crate::{Devis, DevisError};
use std::sync::Mutex;

/// A durable home for the record collection.
pub trait RecordStore: Send + Sync {
    /// Load every record.
    fn load(&self) -> Result<Vec<Devis>, DevisError>;

    /// Replace the stored collection with `records`.
    fn save(&self, records: &[Devis]) -> Result<(), DevisError>;

    /// Short label for logs and status output.
    fn describe(&self) -> String;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<Vec<Devis>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with `records`.
    #[must_use]
    pub fn with_records(records: Vec<Devis>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl RecordStore for MemoryStore {
    fn load(&self) -> Result<Vec<Devis>, DevisError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.clone())
    }

    fn save(&self, records: &[Devis]) -> Result<(), DevisError> {
        let mut stored = self.records.lock().unwrap_or_else(|e| e.into_inner());
        *stored = records.to_vec();
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// =============================================================================
// TESTS
// =============================================================================
