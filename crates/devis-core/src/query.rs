//! # Query Module
//!
//! Filtering, sorting and pagination over a record collection.
//!
//! The collection is always passed in by the caller; the engine holds no
//! state of its own. Filters compose with logical AND:
//!
//! - `search`: case-insensitive substring over claim number, work-order
//!   number, garage and comments (any one may match)
//! - `statut`: exact label match, `"tous"` disables it
//! - `date_from` / `date_to`: inclusive, compared lexicographically on the
//!   ISO 8601 date string
//!
//! `total` is the post-filter, pre-pagination count. A page past the end is
//! an empty slice, never an error.

use crate::primitives::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, STATUT_ALL};
use crate::{Devis, DevisError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// SORTING
// =============================================================================

/// Sortable record fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Date,
    NumeroSinistre,
    #[serde(rename = "numeroOR")]
    NumeroOr,
    Garage,
    Montant,
    Statut,
    Commentaires,
    CreatedAt,
    UpdatedAt,
}

impl SortField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::NumeroSinistre => "numeroSinistre",
            Self::NumeroOr => "numeroOR",
            Self::Garage => "garage",
            Self::Montant => "montant",
            Self::Statut => "statut",
            Self::Commentaires => "commentaires",
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
        }
    }

    const ALL: [SortField; 9] = [
        Self::Date,
        Self::NumeroSinistre,
        Self::NumeroOr,
        Self::Garage,
        Self::Montant,
        Self::Statut,
        Self::Commentaires,
        Self::CreatedAt,
        Self::UpdatedAt,
    ];

    /// Compare two records on this field, ascending.
    fn compare(self, a: &Devis, b: &Devis) -> Ordering {
        match self {
            Self::Date => a.date.cmp(&b.date),
            Self::NumeroSinistre => a.numero_sinistre.cmp(&b.numero_sinistre),
            Self::NumeroOr => a.numero_or.cmp(&b.numero_or),
            Self::Garage => a.garage.cmp(&b.garage),
            Self::Montant => a.montant.amount().total_cmp(&b.montant.amount()),
            Self::Statut => a.statut.cmp(&b.statut),
            Self::Commentaires => a.commentaires.cmp(&b.commentaires),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
            Self::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortField {
    type Err = DevisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| DevisError::Validation(format!("Unknown sort field: {}", s)))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

impl FromStr for SortOrder {
    type Err = DevisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(DevisError::Validation(format!(
                "Unknown sort order: {}",
                other
            ))),
        }
    }
}

/// A field plus a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    #[must_use]
    pub const fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Order two records by this field and direction.
    #[must_use]
    pub fn compare(&self, a: &Devis, b: &Devis) -> Ordering {
        let ord = self.field.compare(a, b);
        match self.order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    }
}

/// Sort records in place.
///
/// The sort is stable: equal keys keep their original relative order in
/// both directions.
pub fn sort_records(records: &mut [Devis], spec: SortSpec) {
    records.sort_by(|a, b| spec.compare(a, b));
}

/// Column-header sort state of a table view.
///
/// Clicking the active field flips the direction; clicking another field
/// switches to it in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    current: SortSpec,
}

impl SortState {
    #[must_use]
    pub const fn new(initial: SortSpec) -> Self {
        Self { current: initial }
    }

    #[must_use]
    pub const fn current(&self) -> SortSpec {
        self.current
    }

    /// Apply a click on `field` and return the resulting spec.
    pub fn toggle(&mut self, field: SortField) -> SortSpec {
        self.current = if self.current.field == field {
            SortSpec::new(field, self.current.order.reversed())
        } else {
            SortSpec::new(field, SortOrder::Asc)
        };
        self.current
    }
}

impl Default for SortState {
    /// The dashboard opens on newest first.
    fn default() -> Self {
        Self::new(SortSpec::new(SortField::Date, SortOrder::Desc))
    }
}

// =============================================================================
// QUERY
// =============================================================================

/// Filter, sort and page specification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevisQuery {
    pub search: Option<String>,
    pub statut: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    /// 1-indexed; values below 1 are read as 1.
    pub page: usize,
    /// Page size; 0 falls back to the default, values above the cap are capped.
    pub limit: usize,
    pub sort: Option<SortSpec>,
}

impl Default for DevisQuery {
    fn default() -> Self {
        Self {
            search: None,
            statut: None,
            date_from: None,
            date_to: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
            sort: None,
        }
    }
}

impl DevisQuery {
    /// Query with every filter disabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    #[must_use]
    pub fn statut(mut self, statut: impl Into<String>) -> Self {
        self.statut = Some(statut.into());
        self
    }

    #[must_use]
    pub fn date_range(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    #[must_use]
    pub fn page(mut self, page: usize, limit: usize) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    #[must_use]
    pub fn sorted(mut self, spec: SortSpec) -> Self {
        self.sort = Some(spec);
        self
    }

    /// Effective page number.
    #[must_use]
    pub fn effective_page(&self) -> usize {
        self.page.max(1)
    }

    /// Effective page size.
    #[must_use]
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.limit.min(MAX_PAGE_SIZE)
        }
    }

    /// Whether a record passes every active filter.
    #[must_use]
    pub fn matches(&self, devis: &Devis) -> bool {
        self.matches_search(devis)
            && self.matches_statut(devis)
            && self.matches_date_range(devis)
    }

    fn matches_search(&self, devis: &Devis) -> bool {
        let Some(needle) = active(&self.search) else {
            return true;
        };
        let needle = needle.to_lowercase();
        [
            &devis.numero_sinistre,
            &devis.numero_or,
            &devis.garage,
            &devis.commentaires,
        ]
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    fn matches_statut(&self, devis: &Devis) -> bool {
        match active(&self.statut) {
            None | Some(STATUT_ALL) => true,
            Some(statut) => devis.statut == statut,
        }
    }

    fn matches_date_range(&self, devis: &Devis) -> bool {
        let after_start = active(&self.date_from).is_none_or(|from| devis.date.as_str() >= from);
        let before_end = active(&self.date_to).is_none_or(|to| devis.date.as_str() <= to);
        after_start && before_end
    }
}

/// An unset or empty filter is inactive.
fn active(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Pagination metadata returned alongside a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// One page of matching records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub data: Vec<Devis>,
    pub pagination: Pagination,
}

/// Run a query over the full collection.
///
/// Records are cloned only for the returned page.
#[must_use]
pub fn query(records: &[Devis], spec: &DevisQuery) -> QueryResult {
    let mut matching: Vec<&Devis> = records.iter().filter(|d| spec.matches(d)).collect();

    if let Some(sort) = spec.sort {
        matching.sort_by(|a, b| sort.compare(a, b));
    }

    let page = spec.effective_page();
    let limit = spec.effective_limit();
    let total = matching.len();
    let total_pages = total.div_ceil(limit);
    let offset = (page - 1).saturating_mul(limit);

    let data = matching
        .into_iter()
        .skip(offset)
        .take(limit)
        .cloned()
        .collect();

    QueryResult {
        data,
        pagination: Pagination {
            page,
            limit,
            total,
            total_pages,
        },
    }
}

// =============================================================================
// TESTS
// =============================================================================
