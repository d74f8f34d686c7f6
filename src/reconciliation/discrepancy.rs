//! Per-counterparty gross totals and net differences

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reconciliation::normalizer::{normalize_with, round_amount};
use crate::types::*;

/// Discrepancies above a threshold plus headline figures for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyReport {
    pub threshold: BigDecimal,
    pub entries: Vec<ProviderDiscrepancy>,
    /// Number of counterparties that passed the threshold
    pub providers_found: usize,
    /// Sum of the absolute differences of all listed counterparties
    pub total_difference: BigDecimal,
}

/// Group both ledgers by counterparty and compare their totals.
///
/// Status is ignored: matched and unmatched records both count towards the
/// gross totals. Records whose identifier normalizes to an empty string are
/// not attributed to any counterparty. Only entries with
/// `|difference| >= threshold` are kept, ordered by `|difference|`
/// descending and then by identifier.
pub fn compute_discrepancies(
    source_a: &[LedgerRecord],
    source_b: &[LedgerRecord],
    mapping: &ColumnMapping,
    threshold: &BigDecimal,
) -> Vec<ProviderDiscrepancy> {
    let zero = BigDecimal::from(0);
    let mut totals: BTreeMap<String, (BigDecimal, BigDecimal)> = BTreeMap::new();

    for record in source_a.iter().chain(source_b.iter()) {
        let view = normalize_with(record, mapping);
        if view.identifier.is_empty() {
            continue;
        }
        let entry = totals
            .entry(view.identifier)
            .or_insert_with(|| (zero.clone(), zero.clone()));
        match record.source {
            SourceSystem::TaxAuthority => entry.0 += view.amount,
            SourceSystem::Accounting => entry.1 += view.amount,
        }
    }

    let threshold = threshold.abs();
    let mut entries: Vec<ProviderDiscrepancy> = totals
        .into_iter()
        .map(|(identifier, (total_a, total_b))| {
            let difference = &total_a - &total_b;
            ProviderDiscrepancy {
                identifier,
                total_a: round_amount(&total_a),
                total_b: round_amount(&total_b),
                difference: round_amount(&difference),
            }
        })
        .filter(|entry| entry.difference.abs() >= threshold)
        .collect();

    entries.sort_by(|x, y| {
        y.difference
            .abs()
            .cmp(&x.difference.abs())
            .then_with(|| x.identifier.cmp(&y.identifier))
    });
    entries
}

/// Build a [`DiscrepancyReport`] for a whole session
pub fn discrepancy_report(session: &Session, threshold: &BigDecimal) -> DiscrepancyReport {
    let entries = compute_discrepancies(
        &session.source_a,
        &session.source_b,
        &session.mapping,
        threshold,
    );
    let total_difference: BigDecimal = entries.iter().map(|e| e.difference.abs()).sum();
    DiscrepancyReport {
        threshold: threshold.clone(),
        providers_found: entries.len(),
        total_difference: round_amount(&total_difference),
        entries,
    }
}
