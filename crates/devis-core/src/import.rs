//! # Import Module
//!
//! Maps loosely-shaped external rows onto canonical records.
//!
//! A row is a column-name → cell map. Each canonical field is looked up
//! under its canonical key and then under its display-label aliases; the
//! first non-empty cell wins. Fields with no usable cell get a default:
//! empty text, `"En étude"` for the status, today's date for the date.
//!
//! Nothing is validated: an out-of-enum status or a non-numeric amount is
//! carried through as-is. Every row yields exactly one record, in input
//! order, with a fresh id.

use crate::primitives::{
    COMMENTAIRES_ALIASES, CSV_DELIMITER, DATE_ALIASES, GARAGE_ALIASES, ID_RANDOM_LEN,
    MAX_IMPORT_ROWS, MONTANT_ALIASES, NUMERO_OR_ALIASES, NUMERO_SINISTRE_ALIASES,
    STATUT_ALIASES,
};
use crate::{Devis, DevisError, Montant, Statut};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::{BTreeMap, HashSet};

/// One external row: column name → raw cell.
pub type RawRow = BTreeMap<String, String>;

// =============================================================================
// ID GENERATION
// =============================================================================

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Issues record ids of the form `<unix-millis><random base36>`.
///
/// The generator remembers every id it was seeded with and every id it
/// handed out, so two ids from the same generator never collide, even
/// within one millisecond.
#[derive(Debug, Default)]
pub struct IdGenerator {
    seen: HashSet<String>,
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with the ids already present in a collection.
    #[must_use]
    pub fn seeded<'a>(existing: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            seen: existing.into_iter().map(str::to_string).collect(),
        }
    }

    /// Produce an id unique among everything this generator has seen.
    pub fn next_id(&mut self, now: DateTime<Utc>) -> String {
        let mut rng = rand::rng();
        loop {
            let suffix: String = (0..ID_RANDOM_LEN)
                .map(|_| char::from(BASE36[rng.random_range(0..BASE36.len())]))
                .collect();
            let id = format!("{}{}", now.timestamp_millis(), suffix);
            if self.seen.insert(id.clone()) {
                return id;
            }
        }
    }
}

// =============================================================================
// COLUMN ALIASES
// =============================================================================

/// Accepted source columns for each canonical field, in lookup order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAliases {
    pub date: Vec<String>,
    pub numero_sinistre: Vec<String>,
    pub numero_or: Vec<String>,
    pub garage: Vec<String>,
    pub montant: Vec<String>,
    pub statut: Vec<String>,
    pub commentaires: Vec<String>,
}

fn owned(aliases: &[&str]) -> Vec<String> {
    aliases.iter().map(|a| (*a).to_string()).collect()
}

impl Default for ColumnAliases {
    fn default() -> Self {
        Self {
            date: owned(DATE_ALIASES),
            numero_sinistre: owned(NUMERO_SINISTRE_ALIASES),
            numero_or: owned(NUMERO_OR_ALIASES),
            garage: owned(GARAGE_ALIASES),
            montant: owned(MONTANT_ALIASES),
            statut: owned(STATUT_ALIASES),
            commentaires: owned(COMMENTAIRES_ALIASES),
        }
    }
}

/// First non-empty cell among `keys`.
fn pick<'a>(row: &'a RawRow, keys: &[String]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| row.get(k))
        .map(String::as_str)
        .find(|v| !v.is_empty())
}

// =============================================================================
// NORMALIZER
// =============================================================================

/// Turns raw rows into records on behalf of one principal.
#[derive(Debug)]
pub struct Normalizer {
    aliases: ColumnAliases,
    ids: IdGenerator,
    principal: String,
    now: DateTime<Utc>,
}

impl Normalizer {
    /// Normalizer stamping `principal` and `now` onto every record.
    #[must_use]
    pub fn new(principal: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            aliases: ColumnAliases::default(),
            ids: IdGenerator::new(),
            principal: principal.into(),
            now,
        }
    }

    #[must_use]
    pub fn with_aliases(mut self, aliases: ColumnAliases) -> Self {
        self.aliases = aliases;
        self
    }

    #[must_use]
    pub fn with_ids(mut self, ids: IdGenerator) -> Self {
        self.ids = ids;
        self
    }

    /// Normalize one row.
    pub fn normalize(&mut self, row: &RawRow) -> Devis {
        let aliases = &self.aliases;
        let text = |keys: &[String]| pick(row, keys).unwrap_or_default().to_string();

        Devis {
            id: self.ids.next_id(self.now),
            date: pick(row, &aliases.date)
                .map(str::to_string)
                .unwrap_or_else(|| today(self.now)),
            numero_sinistre: text(&aliases.numero_sinistre),
            numero_or: text(&aliases.numero_or),
            garage: text(&aliases.garage),
            montant: Montant::Text(text(&aliases.montant)),
            statut: pick(row, &aliases.statut)
                .unwrap_or(Statut::default().as_str())
                .to_string(),
            commentaires: text(&aliases.commentaires),
            created_by: Some(self.principal.clone()),
            created_at: Some(self.now),
            updated_by: None,
            updated_at: None,
        }
    }

    /// Normalize a batch, preserving order.
    pub fn normalize_all(&mut self, rows: &[RawRow]) -> Vec<Devis> {
        rows.iter().map(|row| self.normalize(row)).collect()
    }
}

/// Calendar date of `now` as `YYYY-MM-DD`.
#[must_use]
pub fn today(now: DateTime<Utc>) -> String {
    now.date_naive().format("%Y-%m-%d").to_string()
}

// =============================================================================
// CSV READER
// =============================================================================

/// Parse semicolon-delimited text with a header row into raw rows.
///
/// A leading byte-order mark is dropped and header names are trimmed.
/// Short rows are accepted; their missing cells are simply absent. Any
/// syntax or encoding error fails the whole batch.
pub fn parse_csv(input: &[u8]) -> Result<Vec<RawRow>, DevisError> {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(CSV_DELIMITER)
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if rows.len() >= MAX_IMPORT_ROWS {
            return Err(DevisError::Validation(format!(
                "Import exceeds maximum of {} rows",
                MAX_IMPORT_ROWS
            )));
        }
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 9, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn label_aliases_are_recognised() {
        let mut normalizer = Normalizer::new("alice", fixed_now());
        let devis = normalizer.normalize(&row(&[
            ("Date", "2024-05-30"),
            ("N° de Sinistre", "S-77"),
            ("N° OR", "OR-9"),
            ("Garage", "Garage Central"),
            ("Montant", "830,40"),
            ("Statut", "Validé"),
            ("Commentaires", "urgent"),
        ]));
        assert_eq!(devis.date, "2024-05-30");
        assert_eq!(devis.numero_sinistre, "S-77");
        assert_eq!(devis.numero_or, "OR-9");
        assert_eq!(devis.garage, "Garage Central");
        assert_eq!(devis.montant, Montant::Text("830,40".to_string()));
        assert_eq!(devis.statut, "Validé");
        assert_eq!(devis.commentaires, "urgent");
        assert_eq!(devis.created_by.as_deref(), Some("alice"));
        assert_eq!(devis.created_at, Some(fixed_now()));
    }

    #[test]
    fn canonical_key_wins_over_label() {
        let mut normalizer = Normalizer::new("alice", fixed_now());
        let devis = normalizer.normalize(&row(&[("garage", "A"), ("Garage", "B")]));
        assert_eq!(devis.garage, "A");
    }

    #[test]
    fn empty_cell_falls_through() {
        let mut normalizer = Normalizer::new("alice", fixed_now());
        let devis = normalizer.normalize(&row(&[("garage", ""), ("Garage", "B"), ("statut", "")]));
        assert_eq!(devis.garage, "B");
        assert_eq!(devis.statut, "En étude");
    }

    #[test]
    fn defaults_for_missing_columns() {
        let mut normalizer = Normalizer::new("bob", fixed_now());
        let devis = normalizer.normalize(&row(&[("Montant", "250")]));
        assert_eq!(devis.statut, "En étude");
        assert_eq!(devis.montant, Montant::Text("250".to_string()));
        assert_eq!(devis.date, "2024-06-03");
        assert_eq!(devis.numero_sinistre, "");
        assert_eq!(devis.commentaires, "");
    }

    #[test]
    fn malformed_values_pass_through() {
        let mut normalizer = Normalizer::new("bob", fixed_now());
        let devis = normalizer.normalize(&row(&[("statut", "Annulé"), ("montant", "beaucoup")]));
        assert_eq!(devis.statut, "Annulé");
        assert_eq!(devis.montant.raw(), "beaucoup");
    }

    #[test]
    fn ids_are_unique_within_batch() {
        let mut normalizer = Normalizer::new("bob", fixed_now());
        let rows = vec![RawRow::new(); 500];
        let out = normalizer.normalize_all(&rows);
        let unique: HashSet<&str> = out.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(unique.len(), 500);
        assert!(out.iter().all(|d| d.id.starts_with("1717407000000")));
    }

    #[test]
    fn seeded_generator_avoids_existing() {
        let mut ids = IdGenerator::seeded(["a", "b"]);
        let id = ids.next_id(fixed_now());
        assert_ne!(id, "a");
        assert_eq!(id.len(), 13 + ID_RANDOM_LEN);
    }

    #[test]
    fn custom_aliases() {
        let aliases = ColumnAliases {
            garage: vec!["Atelier".to_string()],
            ..ColumnAliases::default()
        };
        let mut normalizer = Normalizer::new("bob", fixed_now()).with_aliases(aliases);
        let devis = normalizer.normalize(&row(&[("Atelier", "Chez Paul"), ("garage", "ignored")]));
        assert_eq!(devis.garage, "Chez Paul");
    }

    #[test]
    fn parse_csv_with_bom_and_labels() {
        let input = "\u{feff}Date;N° OR; Montant ;Statut\n2024-01-02;OR-1;10;Validé\n2024-01-03;OR-2\n";
        let rows = parse_csv(input.as_bytes()).expect("parse");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("Date").map(String::as_str), Some("2024-01-02"));
        assert_eq!(rows[0].get("Montant").map(String::as_str), Some("10"));
        assert_eq!(rows[1].get("N° OR").map(String::as_str), Some("OR-2"));
        assert!(rows[1].get("Statut").is_none());
    }

    #[test]
    fn parse_csv_quoted_semicolons() {
        let input = "garage;commentaires\n\"A;B\";\"dit \"\"ok\"\"\"\n";
        let rows = parse_csv(input.as_bytes()).expect("parse");
        assert_eq!(rows[0].get("garage").map(String::as_str), Some("A;B"));
        assert_eq!(rows[0].get("commentaires").map(String::as_str), Some("dit \"ok\""));
    }

    #[test]
    fn parse_csv_rejects_invalid_utf8() {
        let input = b"garage\n\xff\xfe\n";
        assert!(matches!(parse_csv(input), Err(DevisError::Csv(_))));
    }

    #[test]
    fn parse_csv_header_only() {
        let rows = parse_csv(b"date;garage\n").expect("parse");
        assert!(rows.is_empty());
    }
}
