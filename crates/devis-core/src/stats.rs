//! # Stats Module
//!
//! Summary statistics over the full, unfiltered collection.
//!
//! Records whose status is outside the three workflow values count toward
//! `total` but toward none of the per-status buckets. Amounts go through
//! [`Montant::amount`](crate::Montant::amount), so malformed values weigh
//! zero instead of failing the computation.

use crate::{Devis, Statut};
use serde::{Deserialize, Serialize};

/// Record counts per workflow status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub en_etude: usize,
    pub valides: usize,
    pub termines: usize,
}

impl StatusCounts {
    fn bump(&mut self, statut: Statut) {
        let slot = match statut {
            Statut::EnEtude => &mut self.en_etude,
            Statut::Valide => &mut self.valides,
            Statut::Termine => &mut self.termines,
        };
        *slot = slot.saturating_add(1);
    }

    /// Count for one status.
    #[must_use]
    pub const fn get(&self, statut: Statut) -> usize {
        match statut {
            Statut::EnEtude => self.en_etude,
            Statut::Valide => self.valides,
            Statut::Termine => self.termines,
        }
    }
}

/// Amounts are finite and non-negative, so the only overflow is towards
/// `+inf`, which JSON cannot carry. Clamp it.
fn saturating_sum(acc: f64, amount: f64) -> f64 {
    (acc + amount).min(f64::MAX)
}

/// Summed amounts per workflow status, for the dashboard charts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAmounts {
    pub en_etude: f64,
    pub valides: f64,
    pub termines: f64,
}

impl StatusAmounts {
    fn add(&mut self, statut: Statut, amount: f64) {
        match statut {
            Statut::EnEtude => self.en_etude = saturating_sum(self.en_etude, amount),
            Statut::Valide => self.valides = saturating_sum(self.valides, amount),
            Statut::Termine => self.termines = saturating_sum(self.termines, amount),
        }
    }
}

/// Aggregate statistics.
///
/// Serializes flat: `{ total, enEtude, valides, termines, montantTotal,
/// montantMoyen, montantByStatus }`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevisStats {
    pub total: usize,
    #[serde(flatten)]
    pub count_by_status: StatusCounts,
    pub montant_total: f64,
    pub montant_moyen: f64,
    #[serde(default)]
    pub montant_by_status: StatusAmounts,
}

/// Compute statistics over every record.
#[must_use]
pub fn aggregate(records: &[Devis]) -> DevisStats {
    let mut stats = DevisStats {
        total: records.len(),
        ..DevisStats::default()
    };

    for devis in records {
        let amount = devis.montant.amount();
        stats.montant_total = saturating_sum(stats.montant_total, amount);
        if let Some(statut) = devis.statut_enum() {
            stats.count_by_status.bump(statut);
            stats.montant_by_status.add(statut, amount);
        }
    }

    if stats.total > 0 {
        stats.montant_moyen = stats.montant_total / stats.total as f64;
    }
    stats
}

// =============================================================================
// TESTS
// =============================================================================
