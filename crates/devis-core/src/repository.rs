//! # Repository Module
//!
//! Record operations over a [`RecordStore`].
//!
//! Every mutation is a load-modify-save cycle over the whole collection.
//! By default those cycles are serialized by a mutex so concurrent writers
//! cannot lose each other's updates. `with_serialized_writes(false)` turns
//! the mutex off, which restores plain last-write-wins behaviour.
//!
//! Reads (`list`, `get`, `stats`, `export_csv`) load a fresh snapshot and
//! never take the write mutex.

use crate::export::export_csv;
use crate::import::{IdGenerator, Normalizer, RawRow, parse_csv, today};
use crate::primitives::MAX_FIELD_LENGTH;
use crate::query::{DevisQuery, QueryResult, query};
use crate::stats::{DevisStats, aggregate};
use crate::storage::RecordStore;
use crate::{Devis, DevisError, DevisInput, Montant};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::{Mutex, MutexGuard};

/// Source of the current time.
pub type Clock = fn() -> DateTime<Utc>;

/// High-level record operations.
pub struct DevisRepository {
    store: Box<dyn RecordStore>,
    write_lock: Mutex<()>,
    serialize_writes: bool,
    clock: Clock,
}

impl std::fmt::Debug for DevisRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevisRepository")
            .field("store", &self.store.describe())
            .field("serialize_writes", &self.serialize_writes)
            .finish_non_exhaustive()
    }
}

impl DevisRepository {
    /// Repository over `store` with serialized writes.
    pub fn new(store: impl RecordStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            write_lock: Mutex::new(()),
            serialize_writes: true,
            clock: Utc::now,
        }
    }

    /// Enable or disable the write mutex.
    #[must_use]
    pub fn with_serialized_writes(mut self, enabled: bool) -> Self {
        self.serialize_writes = enabled;
        self
    }

    /// Replace the clock used for timestamps and default dates.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Label of the underlying store.
    pub fn describe(&self) -> String {
        self.store.describe()
    }

    fn write_guard(&self) -> Option<MutexGuard<'_, ()>> {
        self.serialize_writes
            .then(|| self.write_lock.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Run a load-modify-save cycle. Nothing is saved if `f` fails.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Vec<Devis>) -> Result<T, DevisError>,
    ) -> Result<T, DevisError> {
        let _guard = self.write_guard();
        let mut records = self.store.load()?;
        let out = f(&mut records)?;
        self.store.save(&records)?;
        Ok(out)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// The full collection.
    pub fn all(&self) -> Result<Vec<Devis>, DevisError> {
        self.store.load()
    }

    /// Filter, sort and page.
    pub fn list(&self, spec: &DevisQuery) -> Result<QueryResult, DevisError> {
        Ok(query(&self.store.load()?, spec))
    }

    /// One record by id.
    pub fn get(&self, id: &str) -> Result<Devis, DevisError> {
        self.store
            .load()?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| DevisError::NotFound(id.to_string()))
    }

    /// Aggregate statistics over the whole collection.
    pub fn stats(&self) -> Result<DevisStats, DevisError> {
        Ok(aggregate(&self.store.load()?))
    }

    /// Delimited-text export, or `None` when there is nothing to export.
    pub fn export_csv(&self) -> Result<Option<String>, DevisError> {
        let records = self.store.load()?;
        if records.is_empty() {
            return Ok(None);
        }
        export_csv(&records).map(Some)
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Create a record.
    ///
    /// Date defaults to today, status to "En étude", comments to empty.
    pub fn create(&self, input: DevisInput, principal: &str) -> Result<Devis, DevisError> {
        validate_input(&input)?;
        let statut = input.validated_statut()?.unwrap_or_default();
        let now = (self.clock)();

        self.mutate(|records| {
            let mut ids = IdGenerator::seeded(records.iter().map(|d| d.id.as_str()));
            let devis = Devis {
                id: ids.next_id(now),
                date: input
                    .date
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| today(now)),
                numero_sinistre: input.numero_sinistre.unwrap_or_default(),
                numero_or: input.numero_or.unwrap_or_default(),
                garage: input.garage.unwrap_or_default(),
                montant: input.montant.unwrap_or_default(),
                statut: statut.as_str().to_string(),
                commentaires: input.commentaires.unwrap_or_default(),
                created_by: Some(principal.to_string()),
                created_at: Some(now),
                updated_by: Some(principal.to_string()),
                updated_at: Some(now),
            };
            records.push(devis.clone());
            Ok(devis)
        })
    }

    /// Update a record in place.
    ///
    /// Supplied fields overwrite; absent fields are kept. `id` and creation
    /// provenance never change.
    pub fn update(
        &self,
        id: &str,
        input: DevisInput,
        principal: &str,
    ) -> Result<Devis, DevisError> {
        validate_input(&input)?;
        let statut = input.validated_statut()?;
        let now = (self.clock)();

        self.mutate(|records| {
            let devis = records
                .iter_mut()
                .find(|d| d.id == id)
                .ok_or_else(|| DevisError::NotFound(id.to_string()))?;

            if let Some(date) = input.date.filter(|d| !d.is_empty()) {
                devis.date = date;
            }
            if let Some(v) = input.numero_sinistre {
                devis.numero_sinistre = v;
            }
            if let Some(v) = input.numero_or {
                devis.numero_or = v;
            }
            if let Some(v) = input.garage {
                devis.garage = v;
            }
            if let Some(v) = input.montant {
                devis.montant = v;
            }
            if let Some(st) = statut {
                devis.statut = st.as_str().to_string();
            }
            if let Some(v) = input.commentaires {
                devis.commentaires = v;
            }
            devis.updated_by = Some(principal.to_string());
            devis.updated_at = Some(now);
            Ok(devis.clone())
        })
    }

    /// Delete a record, returning it.
    pub fn delete(&self, id: &str) -> Result<Devis, DevisError> {
        self.mutate(|records| {
            let index = records
                .iter()
                .position(|d| d.id == id)
                .ok_or_else(|| DevisError::NotFound(id.to_string()))?;
            Ok(records.remove(index))
        })
    }

    /// Normalize and append raw rows. Returns the number appended.
    ///
    /// No de-duplication against existing records.
    pub fn import_rows(&self, rows: &[RawRow], principal: &str) -> Result<usize, DevisError> {
        let now = (self.clock)();
        self.mutate(|records| {
            let ids = IdGenerator::seeded(records.iter().map(|d| d.id.as_str()));
            let mut normalizer = Normalizer::new(principal, now).with_ids(ids);
            let imported = normalizer.normalize_all(rows);
            let count = imported.len();
            records.extend(imported);
            Ok(count)
        })
    }

    /// Parse semicolon-delimited text and append its rows.
    ///
    /// The text is parsed completely before anything is written.
    pub fn import_csv(&self, input: &[u8], principal: &str) -> Result<usize, DevisError> {
        let rows = parse_csv(input)?;
        self.import_rows(&rows, principal)
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Write-path checks. Status is validated separately.
fn validate_input(input: &DevisInput) -> Result<(), DevisError> {
    let texts = [
        ("numeroSinistre", &input.numero_sinistre),
        ("numeroOR", &input.numero_or),
        ("garage", &input.garage),
        ("commentaires", &input.commentaires),
        ("date", &input.date),
    ];
    for (name, value) in texts {
        if value.as_ref().is_some_and(|v| v.len() > MAX_FIELD_LENGTH) {
            return Err(DevisError::Validation(format!(
                "{} exceeds {} bytes",
                name, MAX_FIELD_LENGTH
            )));
        }
    }

    if let Some(date) = input.date.as_deref().filter(|d| !d.is_empty()) {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
            DevisError::Validation(format!("date must be YYYY-MM-DD, got {:?}", date))
        })?;
    }

    if let Some(montant) = &input.montant {
        if !montant.is_valid() {
            return Err(DevisError::Validation(format!(
                "montant must be a non-negative number, got {:?}",
                montant.raw()
            )));
        }
        if matches!(montant, Montant::Text(s) if s.len() > MAX_FIELD_LENGTH) {
            return Err(DevisError::Validation(format!(
                "montant exceeds {} bytes",
                MAX_FIELD_LENGTH
            )));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
