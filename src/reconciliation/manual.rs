//! Operator-driven matching and de-reconciliation
//!
//! The [`ManualSelection`] holds the records an operator has picked so far.
//! Running totals are recomputed after every change so they can be shown
//! while the selection is still being built. Confirming applies the selection
//! to a [`Session`] and hands the touched records back to the caller, which
//! owns persistence.

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::reconciliation::normalizer::{amount_of, round_amount};
use crate::types::*;

/// Which part of the selection a record is added to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SelectionBucket {
    /// Pending tax-authority records to match
    PendingA,
    /// Pending accounting records to match
    PendingB,
    /// Already reconciled records to unwind
    Reconciled,
}

/// Running totals of the pending part of a selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionTotals {
    pub sum_a: BigDecimal,
    pub sum_b: BigDecimal,
    /// `sum_a - sum_b`
    pub net: BigDecimal,
}

impl Default for SelectionTotals {
    fn default() -> Self {
        Self {
            sum_a: BigDecimal::from(0),
            sum_b: BigDecimal::from(0),
            net: BigDecimal::from(0),
        }
    }
}

impl SelectionTotals {
    /// Whether both sides agree at displayed precision
    pub fn is_balanced(&self) -> bool {
        round_amount(&self.net) == BigDecimal::from(0)
    }
}

/// Records freed by a de-reconciliation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dereconciliation {
    pub match_id: MatchId,
    pub freed: Vec<LedgerRecord>,
}

/// Records chosen by an operator, with their amounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualSelection {
    pending_a: BTreeMap<RecordId, BigDecimal>,
    pending_b: BTreeMap<RecordId, BigDecimal>,
    reconciled: BTreeMap<RecordId, MatchId>,
    totals: SelectionTotals,
}

impl ManualSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current running totals
    pub fn totals(&self) -> &SelectionTotals {
        &self.totals
    }

    pub fn selected(&self, bucket: SelectionBucket) -> BTreeSet<RecordId> {
        match bucket {
            SelectionBucket::PendingA => self.pending_a.keys().copied().collect(),
            SelectionBucket::PendingB => self.pending_b.keys().copied().collect(),
            SelectionBucket::Reconciled => self.reconciled.keys().copied().collect(),
        }
    }

    pub fn contains(&self, record_id: RecordId, bucket: SelectionBucket) -> bool {
        match bucket {
            SelectionBucket::PendingA => self.pending_a.contains_key(&record_id),
            SelectionBucket::PendingB => self.pending_b.contains_key(&record_id),
            SelectionBucket::Reconciled => self.reconciled.contains_key(&record_id),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending_a.is_empty() && self.pending_b.is_empty() && self.reconciled.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Add a record to one bucket of the selection.
    ///
    /// Pending buckets accept only pending records of the matching source;
    /// the reconciled bucket accepts only records bound to a match group.
    pub fn add_to_selection(
        &mut self,
        record: &LedgerRecord,
        bucket: SelectionBucket,
        mapping: &ColumnMapping,
    ) -> ReconResult<()> {
        match bucket {
            SelectionBucket::PendingA | SelectionBucket::PendingB => {
                let expected = if bucket == SelectionBucket::PendingA {
                    SourceSystem::TaxAuthority
                } else {
                    SourceSystem::Accounting
                };
                if record.source != expected {
                    return Err(ReconError::Validation(format!(
                        "Record {} belongs to {}, not {}",
                        record.record_id,
                        record.source.label(),
                        expected.label()
                    )));
                }
                if !record.is_pending() {
                    return Err(ReconError::Validation(format!(
                        "Record {} is already reconciled",
                        record.record_id
                    )));
                }
                let amount = amount_of(record, mapping);
                let target = if bucket == SelectionBucket::PendingA {
                    &mut self.pending_a
                } else {
                    &mut self.pending_b
                };
                target.insert(record.record_id, amount);
            }
            SelectionBucket::Reconciled => {
                let match_id = record.match_id.clone().ok_or_else(|| {
                    ReconError::Validation(format!(
                        "Record {} is not reconciled",
                        record.record_id
                    ))
                })?;
                self.reconciled.insert(record.record_id, match_id);
            }
        }
        self.recompute_totals();
        Ok(())
    }

    /// Remove a record from one bucket; removing an absent record is a no-op
    pub fn remove_from_selection(&mut self, record_id: RecordId, bucket: SelectionBucket) {
        match bucket {
            SelectionBucket::PendingA => {
                self.pending_a.remove(&record_id);
            }
            SelectionBucket::PendingB => {
                self.pending_b.remove(&record_id);
            }
            SelectionBucket::Reconciled => {
                self.reconciled.remove(&record_id);
            }
        }
        self.recompute_totals();
    }

    fn recompute_totals(&mut self) {
        let sum_a: BigDecimal = self.pending_a.values().sum();
        let sum_b: BigDecimal = self.pending_b.values().sum();
        let net = &sum_a - &sum_b;
        self.totals = SelectionTotals {
            sum_a: round_amount(&sum_a),
            sum_b: round_amount(&sum_b),
            net: round_amount(&net),
        };
    }

    /// Bind every selected pending record into one new match group.
    ///
    /// Needs at least one record on each side. If the side totals differ the
    /// whole group becomes [`RecordStatus::ReconciledWithDifference`]. Every
    /// selected record is checked against the session before anything is
    /// mutated, so a stale selection fails without side effects.
    pub fn confirm_manual_match(&mut self, session: &mut Session) -> ReconResult<MatchGroup> {
        if self.pending_a.is_empty() || self.pending_b.is_empty() {
            tracing::warn!(
                selected_a = self.pending_a.len(),
                selected_b = self.pending_b.len(),
                "Manual match rejected: empty side"
            );
            return Err(ReconError::Validation(
                "Select at least one record from each source to reconcile".to_string(),
            ));
        }

        let positions = session.record_positions();
        let mut slots = Vec::with_capacity(self.pending_a.len() + self.pending_b.len());
        for (record_id, source) in self
            .pending_a
            .keys()
            .map(|id| (*id, SourceSystem::TaxAuthority))
            .chain(self.pending_b.keys().map(|id| (*id, SourceSystem::Accounting)))
        {
            let &(side, index) = positions
                .get(&record_id)
                .ok_or(ReconError::RecordNotFound(record_id))?;
            let record = &session.records(side)[index];
            slots.push((side, index));
            if side != source || !record.is_pending() {
                return Err(ReconError::Validation(format!(
                    "Record {record_id} is no longer pending in {}",
                    source.label()
                )));
            }
        }

        let status = if self.totals.is_balanced() {
            RecordStatus::Reconciled
        } else {
            RecordStatus::ReconciledWithDifference
        };
        let match_id = session.match_sequence.next_manual();
        let records_a: Vec<RecordId> = self.pending_a.keys().copied().collect();
        let records_b: Vec<RecordId> = self.pending_b.keys().copied().collect();

        for (side, index) in slots {
            session.records_mut(side)[index].bind(match_id.clone(), status);
        }
        session.touch();

        tracing::info!(
            match_id = %match_id,
            records_a = records_a.len(),
            records_b = records_b.len(),
            net = %self.totals.net,
            status = status.label(),
            "Manual match confirmed"
        );

        self.clear();
        Ok(MatchGroup {
            match_id,
            kind: MatchKind::Manual,
            status,
            records_a,
            records_b,
        })
    }

    /// Dissolve the single match group the reconciled bucket points at.
    ///
    /// Fails without mutating anything unless every selected record shares
    /// one match identifier. On success every member of that group, selected
    /// or not, returns to pending.
    pub fn confirm_dereconcile(&mut self, session: &mut Session) -> ReconResult<Dereconciliation> {
        let match_ids: BTreeSet<&MatchId> = self.reconciled.values().collect();
        let match_id = match match_ids.len() {
            0 => {
                return Err(ReconError::Validation(
                    "Select at least one reconciled record to undo".to_string(),
                ))
            }
            1 => match_ids
                .into_iter()
                .next()
                .cloned()
                .ok_or_else(|| ReconError::Validation("Empty selection".to_string()))?,
            n => {
                tracing::warn!(groups = n, "De-reconciliation rejected: mixed match groups");
                return Err(ReconError::Validation(format!(
                    "Selected records span {n} different matches; select records from a single match"
                )));
            }
        };

        let positions = session.record_positions();
        for record_id in self.reconciled.keys() {
            let &(side, index) = positions
                .get(record_id)
                .ok_or(ReconError::RecordNotFound(*record_id))?;
            let record = &session.records(side)[index];
            if record.match_id.as_ref() != Some(&match_id) {
                return Err(ReconError::Validation(format!(
                    "Record {record_id} is no longer part of match {match_id}"
                )));
            }
        }

        let mut freed = Vec::new();
        for record in session
            .source_a
            .iter_mut()
            .chain(session.source_b.iter_mut())
            .filter(|r| r.match_id.as_ref() == Some(&match_id))
        {
            record.release();
            freed.push(record.clone());
        }
        session.touch();

        tracing::info!(match_id = %match_id, freed = freed.len(), "Match dissolved");

        self.clear();
        Ok(Dereconciliation { match_id, freed })
    }
}
