//! # Primitives
//!
//! Fixed constants shared by the query engine, the CSV codecs and the stores.

// =============================================================================
// QUERY LIMITS
// =============================================================================

/// Page size used when the caller gives none (or an invalid one).
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Largest page size a caller may request.
pub const MAX_PAGE_SIZE: usize = 1000;

/// Status filter value meaning "every status".
pub const STATUT_ALL: &str = "tous";

// =============================================================================
// CSV FORMAT
// =============================================================================

/// Field delimiter for import and export (spreadsheet-locale friendly).
pub const CSV_DELIMITER: u8 = b';';

/// Byte-order mark prefixed to every export.
pub const UTF8_BOM: char = '\u{feff}';

/// Export column order. `id` and provenance fields are not exported.
pub const EXPORT_FIELDS: [&str; 7] = [
    "date",
    "numeroSinistre",
    "numeroOR",
    "garage",
    "montant",
    "statut",
    "commentaires",
];

/// Import column aliases: canonical key first, then accepted display labels.
pub const DATE_ALIASES: &[&str] = &["date", "Date"];
pub const NUMERO_SINISTRE_ALIASES: &[&str] = &["numeroSinistre", "N° de Sinistre"];
pub const NUMERO_OR_ALIASES: &[&str] = &["numeroOR", "N° OR"];
pub const GARAGE_ALIASES: &[&str] = &["garage", "Garage"];
pub const MONTANT_ALIASES: &[&str] = &["montant", "Montant"];
pub const STATUT_ALIASES: &[&str] = &["statut", "Statut"];
pub const COMMENTAIRES_ALIASES: &[&str] = &["commentaires", "Commentaires"];

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum size of a persisted collection or user file (100 MB).
///
/// Checked before deserialization.
pub const MAX_STORE_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum number of rows accepted by a single import.
pub const MAX_IMPORT_ROWS: usize = 100_000;

/// Maximum length of a single free-text field on the write path.
pub const MAX_FIELD_LENGTH: usize = 4096;

/// Length of the random suffix of generated ids.
pub const ID_RANDOM_LEN: usize = 9;
