//! # devis-core
//!
//! The record engine behind the devis dashboard - THE LOGIC.
//!
//! This crate tracks insurance repair quotes ("devis"): it stores the
//! collection, filters and pages it, aggregates it into statistics, and
//! moves it in and out of semicolon-delimited text.
//!
//! ## Components
//!
//! - `storage`: whole-collection load/save (`RecordStore`)
//! - `query`: filtering, sorting, pagination
//! - `stats`: counts per status, total and average amount
//! - `import`: raw-row normalization, id generation, CSV reading
//! - `export`: canonical CSV writing
//! - `repository`: create/read/update/delete over a store
//! - `users`: account list and password hashing
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies
//! - The collection is passed in explicitly; there is no global cache
//! - Errors are returned, never logged or swallowed here

// =============================================================================
// MODULES
// =============================================================================

pub mod export;
pub mod formats;
pub mod import;
pub mod primitives;
pub mod query;
pub mod repository;
pub mod stats;
pub mod storage;
pub mod types;
pub mod users;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Devis, DevisError, DevisInput, Montant, Statut};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use export::{export_csv, to_raw_row};
pub use import::{ColumnAliases, IdGenerator, Normalizer, RawRow, parse_csv};
pub use query::{
    DevisQuery, Pagination, QueryResult, SortField, SortOrder, SortSpec, SortState, query,
    sort_records,
};
pub use repository::DevisRepository;
pub use stats::{DevisStats, StatusAmounts, StatusCounts, aggregate};
pub use storage::{JsonFileStore, MemoryStore, RecordStore};
pub use users::{User, UserStore};
