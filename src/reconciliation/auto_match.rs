//! Automatic one-to-one matching on exact (identifier, rounded amount) keys

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::reconciliation::normalizer::normalize_with;
use crate::types::*;

/// Composite key two records must share to be matched automatically
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MatchKey {
    identifier: String,
    amount: BigDecimal,
}

impl MatchKey {
    fn of(view: &NormalizedView) -> Self {
        Self {
            identifier: view.identifier.clone(),
            amount: view.rounded_amount().normalized(),
        }
    }
}

/// Result of an automatic matching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoMatchOutcome {
    /// Newly created groups, in the order their A-side records appear
    pub matches: Vec<MatchGroup>,
    pub updated_a: Vec<LedgerRecord>,
    pub updated_b: Vec<LedgerRecord>,
}

impl AutoMatchOutcome {
    /// Records on either side still waiting for a counterpart
    pub fn pending_count(&self) -> usize {
        self.updated_a
            .iter()
            .chain(self.updated_b.iter())
            .filter(|r| r.is_pending())
            .count()
    }
}

/// Pair pending A-side records with pending B-side records.
///
/// B-side records are bucketed by `(identifier, amount rounded to 2 digits)`
/// in original order. Each A-side record, in original order, consumes the
/// earliest remaining B-side record in its bucket. Records that are already
/// reconciled on either side are left untouched and never considered, so
/// running this again over its own output creates no new matches.
///
/// Identifiers are minted from `sequence`, so they stay unique within the
/// session that owns it.
pub fn auto_match(
    source_a: &[LedgerRecord],
    source_b: &[LedgerRecord],
    mapping: &ColumnMapping,
    sequence: &mut MatchSequence,
) -> AutoMatchOutcome {
    let mut updated_a = source_a.to_vec();
    let mut updated_b = source_b.to_vec();

    let mut buckets: HashMap<MatchKey, VecDeque<usize>> = HashMap::new();
    for (index, record) in updated_b.iter().enumerate() {
        if !record.is_pending() {
            continue;
        }
        let key = MatchKey::of(&normalize_with(record, mapping));
        buckets.entry(key).or_default().push_back(index);
    }

    let mut matches = Vec::new();
    for record_a in updated_a.iter_mut() {
        if !record_a.is_pending() {
            continue;
        }
        let key = MatchKey::of(&normalize_with(record_a, mapping));
        let Some(index_b) = buckets.get_mut(&key).and_then(VecDeque::pop_front) else {
            continue;
        };

        let match_id = sequence.next_auto();
        let record_b = &mut updated_b[index_b];
        record_a.bind(match_id.clone(), RecordStatus::Reconciled);
        record_b.bind(match_id.clone(), RecordStatus::Reconciled);

        tracing::debug!(
            match_id = %match_id,
            identifier = %key.identifier,
            amount = %key.amount,
            "Records matched"
        );

        matches.push(MatchGroup {
            match_id,
            kind: MatchKind::Automatic,
            status: RecordStatus::Reconciled,
            records_a: vec![record_a.record_id],
            records_b: vec![record_b.record_id],
        });
    }

    tracing::info!(
        matched = matches.len(),
        source_a = updated_a.len(),
        source_b = updated_b.len(),
        "Automatic matching complete"
    );

    AutoMatchOutcome {
        matches,
        updated_a,
        updated_b,
    }
}

/// Run [`auto_match`] over a session and write the result back into it
pub fn auto_match_session(session: &mut Session) -> Vec<MatchGroup> {
    let outcome = auto_match(
        &session.source_a,
        &session.source_b,
        &session.mapping,
        &mut session.match_sequence,
    );
    session.source_a = outcome.updated_a;
    session.source_b = outcome.updated_b;
    session.process_state = ProcessState::Finished;
    session.touch();
    outcome.matches
}
