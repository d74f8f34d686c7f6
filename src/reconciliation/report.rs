//! Read-only views of a session for presentation and export

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::reconciliation::normalizer::{
    amount_of, identifier_of, normalize_identifier, round_amount,
};
use crate::types::*;

/// Headline figures for the tax-authority side of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralSummary {
    pub total_a: BigDecimal,
    pub record_count_a: usize,
    pub reconciled_total: BigDecimal,
    pub reconciled_count: usize,
    /// `total_a - reconciled_total`
    pub pending_total: BigDecimal,
    pub pending_count: usize,
}

/// Summarize source A into reconciled and pending totals
pub fn general_summary(session: &Session) -> GeneralSummary {
    let mut total = BigDecimal::from(0);
    let mut reconciled_total = BigDecimal::from(0);
    let mut reconciled_count = 0;
    let mut pending_count = 0;

    for record in &session.source_a {
        let amount = amount_of(record, &session.mapping);
        if record.status.is_reconciled() {
            reconciled_total += &amount;
            reconciled_count += 1;
        } else {
            pending_count += 1;
        }
        total += amount;
    }

    let pending_total = &total - &reconciled_total;
    GeneralSummary {
        total_a: round_amount(&total),
        record_count_a: session.source_a.len(),
        reconciled_total: round_amount(&reconciled_total),
        reconciled_count,
        pending_total: round_amount(&pending_total),
        pending_count,
    }
}

/// Sorted, de-duplicated, non-empty counterparty identifiers across both sides
pub fn provider_identifiers(session: &Session) -> Vec<String> {
    session
        .all_records()
        .map(|record| identifier_of(record, &session.mapping))
        .filter(|identifier| !identifier.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Everything an operator needs to review one counterparty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDetail {
    pub identifier: String,
    pub pending_a: Vec<LedgerRecord>,
    pub reconciled_a: Vec<LedgerRecord>,
    pub unmatched_b: Vec<LedgerRecord>,
    pub reconciled_b: Vec<LedgerRecord>,
    pub total_a: BigDecimal,
    pub total_b: BigDecimal,
    pub difference: BigDecimal,
}

/// Partition one counterparty's records by source and status
pub fn provider_detail(session: &Session, identifier: &str) -> ProviderDetail {
    let wanted = normalize_identifier(&RawValue::from(identifier));

    let mut detail = ProviderDetail {
        identifier: wanted.clone(),
        pending_a: Vec::new(),
        reconciled_a: Vec::new(),
        unmatched_b: Vec::new(),
        reconciled_b: Vec::new(),
        total_a: BigDecimal::from(0),
        total_b: BigDecimal::from(0),
        difference: BigDecimal::from(0),
    };
    if wanted.is_empty() {
        return detail;
    }

    for record in session.all_records() {
        if identifier_of(record, &session.mapping) != wanted {
            continue;
        }
        let amount = amount_of(record, &session.mapping);
        match (record.source, record.status.is_reconciled()) {
            (SourceSystem::TaxAuthority, false) => detail.pending_a.push(record.clone()),
            (SourceSystem::TaxAuthority, true) => detail.reconciled_a.push(record.clone()),
            (SourceSystem::Accounting, false) => detail.unmatched_b.push(record.clone()),
            (SourceSystem::Accounting, true) => detail.reconciled_b.push(record.clone()),
        }
        match record.source {
            SourceSystem::TaxAuthority => detail.total_a += amount,
            SourceSystem::Accounting => detail.total_b += amount,
        }
    }

    detail.difference = round_amount(&(&detail.total_a - &detail.total_b));
    detail.total_a = round_amount(&detail.total_a);
    detail.total_b = round_amount(&detail.total_b);
    detail
}

/// A named group of records ready to be written as one worksheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSheet {
    pub name: String,
    pub records: Vec<LedgerRecord>,
}

pub const SHEET_PENDING_A: &str = "Source A Pending";
pub const SHEET_RECONCILED: &str = "Reconciled";
pub const SHEET_UNMATCHED_B: &str = "Source B Unmatched";

/// Split a session into export sheets by final status.
///
/// Empty sheets are omitted; a session with nothing to export is an error.
pub fn export_partition(session: &Session) -> ReconResult<Vec<ReportSheet>> {
    let pending_a = session.source_a.iter().filter(|r| r.is_pending());
    let reconciled = session.source_a.iter().filter(|r| r.status.is_reconciled());
    let unmatched_b = session.source_b.iter().filter(|r| r.is_pending());

    let sheets: Vec<ReportSheet> = [
        (SHEET_PENDING_A, pending_a.cloned().collect::<Vec<_>>()),
        (SHEET_RECONCILED, reconciled.cloned().collect()),
        (SHEET_UNMATCHED_B, unmatched_b.cloned().collect()),
    ]
    .into_iter()
    .filter(|(_, records)| !records.is_empty())
    .map(|(name, records)| ReportSheet {
        name: name.to_string(),
        records,
    })
    .collect();

    if sheets.is_empty() {
        return Err(ReconError::Validation(
            "No records in any category to export".to_string(),
        ));
    }
    Ok(sheets)
}
