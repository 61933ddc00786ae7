//! # Export Module
//!
//! Flat, spreadsheet-ready serialization of a record collection.
//!
//! ## Format
//!
//! - UTF-8 with a leading byte-order mark, so spreadsheet readers pick the
//!   right character set
//! - Semicolon-delimited, `\n`-terminated
//! - Header row of canonical field names, then one row per record
//! - Columns: date, numeroSinistre, numeroOR, garage, montant, statut,
//!   commentaires. `id` and provenance are not exported.
//! - Non-numeric fields are quoted

use crate::import::RawRow;
use crate::primitives::{CSV_DELIMITER, EXPORT_FIELDS, UTF8_BOM};
use crate::{Devis, DevisError};

/// Export cells of one record, in [`EXPORT_FIELDS`] order.
#[must_use]
pub fn export_cells(devis: &Devis) -> [String; 7] {
    [
        devis.date.clone(),
        devis.numero_sinistre.clone(),
        devis.numero_or.clone(),
        devis.garage.clone(),
        devis.montant.raw(),
        devis.statut.clone(),
        devis.commentaires.clone(),
    ]
}

/// One record as a header → cell row, the shape an import reads back.
#[must_use]
pub fn to_raw_row(devis: &Devis) -> RawRow {
    EXPORT_FIELDS
        .iter()
        .map(|f| (*f).to_string())
        .zip(export_cells(devis))
        .collect()
}

/// Serialize records to delimited text.
///
/// An empty collection yields the byte-order mark and the header row.
pub fn export_csv(records: &[Devis]) -> Result<String, DevisError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(CSV_DELIMITER)
        .quote_style(csv::QuoteStyle::NonNumeric)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(EXPORT_FIELDS)?;
    for devis in records {
        writer.write_record(export_cells(devis))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| DevisError::Csv(e.to_string()))?;
    let body = String::from_utf8(bytes).map_err(|e| DevisError::Serialization(e.to_string()))?;

    let mut out = String::with_capacity(body.len() + UTF8_BOM.len_utf8());
    out.push(UTF8_BOM);
    out.push_str(&body);
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================
