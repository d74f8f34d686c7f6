//! Core types and data structures for the reconciliation engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use crate::reconciliation::normalizer::round_amount;

/// The two ledgers that take part in a reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceSystem {
    /// Source A - the tax-authority export of withholdings
    TaxAuthority,
    /// Source B - the internal accounting export
    Accounting,
}

impl SourceSystem {
    /// Human-readable label used in reports
    pub fn label(&self) -> &'static str {
        match self {
            SourceSystem::TaxAuthority => "Tax Authority",
            SourceSystem::Accounting => "Accounting",
        }
    }

    /// The ledger on the other side of the reconciliation
    pub fn counterpart(&self) -> SourceSystem {
        match self {
            SourceSystem::TaxAuthority => SourceSystem::Accounting,
            SourceSystem::Accounting => SourceSystem::TaxAuthority,
        }
    }
}

/// Reconciliation state of a single ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    /// Not yet bound to any match group
    Pending,
    /// Bound to a match group whose sides agree
    Reconciled,
    /// Bound to a manual match group whose side totals differ
    ReconciledWithDifference,
}

impl RecordStatus {
    /// Whether the record belongs to a match group
    pub fn is_reconciled(&self) -> bool {
        matches!(
            self,
            RecordStatus::Reconciled | RecordStatus::ReconciledWithDifference
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "Pending",
            RecordStatus::Reconciled => "Reconciled",
            RecordStatus::ReconciledWithDifference => "Reconciled with difference",
        }
    }
}

/// Review status an operator assigns to a whole session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    #[default]
    Draft,
    InReview,
    Finalized,
}

/// How far the automatic pipeline has progressed for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProcessState {
    /// Files imported, automatic matching not yet run
    #[default]
    Imported,
    /// Automatic matching has run at least once
    Finished,
}

/// Opaque identifier of a persisted ledger record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub Uuid);

impl RecordId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a reconciliation session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier shared by every member of a match group
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(String);

impl MatchId {
    /// Identifier for a match produced by the auto-matcher
    pub fn auto(sequence: u64) -> Self {
        Self(format!("auto_{sequence}"))
    }

    /// Identifier for a match confirmed by an operator
    pub fn manual(sequence: u64) -> Self {
        Self(format!("manual_{sequence}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session-local counter that mints match identifiers.
///
/// Automatic and manual matches draw from the same counter, so identifiers
/// never collide within a session regardless of which path created them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSequence {
    last: u64,
}

impl MatchSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_auto(&mut self) -> MatchId {
        self.last += 1;
        MatchId::auto(self.last)
    }

    pub fn next_manual(&mut self) -> MatchId {
        self.last += 1;
        MatchId::manual(self.last)
    }

    /// Number of identifiers minted so far
    pub fn issued(&self) -> u64 {
        self.last
    }
}

/// A scalar cell value as produced by spreadsheet ingestion.
///
/// Serialized with an explicit variant tag (`{"text": "2024-03-01"}`), so a
/// stored cell always reloads as the variant it was ingested as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawValue {
    Number(f64),
    Date(NaiveDate),
    Text(String),
}

impl RawValue {
    /// Missing cells are ingested as empty text
    pub fn empty() -> Self {
        RawValue::Text(String::new())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, RawValue::Text(text) if text.trim().is_empty())
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        RawValue::Number(value)
    }
}

impl From<i64> for RawValue {
    fn from(value: i64) -> Self {
        RawValue::Number(value as f64)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(value: NaiveDate) -> Self {
        RawValue::Date(value)
    }
}

/// One imported spreadsheet row: column name to cell value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(BTreeMap<String, RawValue>);

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a cell, builder style
    pub fn with(mut self, column: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.0.insert(column.into(), value.into());
        self
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.0.get(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<RawValue>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(column, value)| (column.into(), value.into()))
                .collect(),
        )
    }
}

/// Which columns hold the counterparty identifier and the amount on each side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub identifier_col_a: Option<String>,
    pub amount_col_a: Option<String>,
    pub identifier_col_b: Option<String>,
    pub amount_col_b: Option<String>,
}

impl ColumnMapping {
    /// Create a fully specified mapping
    pub fn new(
        identifier_col_a: impl Into<String>,
        amount_col_a: impl Into<String>,
        identifier_col_b: impl Into<String>,
        amount_col_b: impl Into<String>,
    ) -> Self {
        Self {
            identifier_col_a: Some(identifier_col_a.into()),
            amount_col_a: Some(amount_col_a.into()),
            identifier_col_b: Some(identifier_col_b.into()),
            amount_col_b: Some(amount_col_b.into()),
        }
    }

    pub fn identifier_column(&self, source: SourceSystem) -> Option<&str> {
        match source {
            SourceSystem::TaxAuthority => self.identifier_col_a.as_deref(),
            SourceSystem::Accounting => self.identifier_col_b.as_deref(),
        }
    }

    pub fn amount_column(&self, source: SourceSystem) -> Option<&str> {
        match source {
            SourceSystem::TaxAuthority => self.amount_col_a.as_deref(),
            SourceSystem::Accounting => self.amount_col_b.as_deref(),
        }
    }

    /// Names of the mapping fields that are unset or blank
    pub fn missing_columns(&self) -> Vec<&'static str> {
        let fields = [
            ("identifier_col_a", &self.identifier_col_a),
            ("amount_col_a", &self.amount_col_a),
            ("identifier_col_b", &self.identifier_col_b),
            ("amount_col_b", &self.amount_col_b),
        ];
        fields
            .into_iter()
            .filter(|(_, column)| column.as_deref().is_none_or(|c| c.trim().is_empty()))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_columns().is_empty()
    }
}

/// Canonical projection of a raw record used for comparison.
///
/// Derived on demand and never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedView {
    /// Counterparty tax ID, uppercased with separators removed
    pub identifier: String,
    /// Parsed amount at full precision
    pub amount: BigDecimal,
    /// The record this view was derived from
    pub original_ref: RecordId,
}

impl NormalizedView {
    /// Amount at displayed precision (2 fraction digits), the matching key
    pub fn rounded_amount(&self) -> BigDecimal {
        round_amount(&self.amount)
    }
}

/// A single imported row together with its reconciliation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub record_id: RecordId,
    pub source: SourceSystem,
    /// Position of the row in the imported file
    pub row_index: usize,
    pub raw_fields: RawRecord,
    pub status: RecordStatus,
    pub match_id: Option<MatchId>,
    pub comment: Option<String>,
}

impl LedgerRecord {
    /// Create a new pending record
    pub fn new(source: SourceSystem, row_index: usize, raw_fields: RawRecord) -> Self {
        Self {
            record_id: RecordId::new(),
            source,
            row_index,
            raw_fields,
            status: RecordStatus::Pending,
            match_id: None,
            comment: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }

    /// Bind the record into a match group
    pub(crate) fn bind(&mut self, match_id: MatchId, status: RecordStatus) {
        debug_assert!(status.is_reconciled());
        self.match_id = Some(match_id);
        self.status = status;
    }

    /// Detach the record from its match group
    pub(crate) fn release(&mut self) {
        self.match_id = None;
        self.status = RecordStatus::Pending;
    }

    /// Whether `status` and `match_id` agree with each other
    pub fn is_consistent(&self) -> bool {
        self.match_id.is_some() == self.status.is_reconciled()
    }
}

/// How a match group came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchKind {
    Automatic,
    Manual,
}

/// Records bound together as the same underlying transaction(s)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchGroup {
    pub match_id: MatchId,
    pub kind: MatchKind,
    pub status: RecordStatus,
    pub records_a: Vec<RecordId>,
    pub records_b: Vec<RecordId>,
}

impl MatchGroup {
    /// Total number of member records across both sides
    pub fn len(&self) -> usize {
        self.records_a.len() + self.records_b.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, record_id: RecordId) -> bool {
        self.records_a.contains(&record_id) || self.records_b.contains(&record_id)
    }
}

/// Gross per-counterparty totals across both ledgers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDiscrepancy {
    pub identifier: String,
    pub total_a: BigDecimal,
    pub total_b: BigDecimal,
    /// `total_a - total_b`
    pub difference: BigDecimal,
}

/// One reconciliation working set spanning both ledgers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub process_state: ProcessState,
    pub mapping: ColumnMapping,
    pub source_a: Vec<LedgerRecord>,
    pub source_b: Vec<LedgerRecord>,
    pub match_sequence: MatchSequence,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Session {
    /// Create an empty draft session
    pub fn new(name: impl Into<String>, mapping: ColumnMapping) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: SessionId::new(),
            name: name.into(),
            status: SessionStatus::Draft,
            process_state: ProcessState::Imported,
            mapping,
            source_a: Vec::new(),
            source_b: Vec::new(),
            match_sequence: MatchSequence::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a session from freshly ingested rows.
    ///
    /// Every row becomes one pending [`LedgerRecord`]. The name must not be
    /// blank and all four mapping columns must be chosen.
    pub fn import(
        name: &str,
        mapping: ColumnMapping,
        rows_a: Vec<RawRecord>,
        rows_b: Vec<RawRecord>,
    ) -> ReconResult<Self> {
        let name = crate::utils::validate_session_name(name)?;
        crate::utils::validate_mapping(&mapping)?;

        let mut session = Session::new(name, mapping);
        session.source_a = rows_a
            .into_iter()
            .enumerate()
            .map(|(i, row)| LedgerRecord::new(SourceSystem::TaxAuthority, i, row))
            .collect();
        session.source_b = rows_b
            .into_iter()
            .enumerate()
            .map(|(i, row)| LedgerRecord::new(SourceSystem::Accounting, i, row))
            .collect();
        Ok(session)
    }

    pub fn records(&self, source: SourceSystem) -> &[LedgerRecord] {
        match source {
            SourceSystem::TaxAuthority => &self.source_a,
            SourceSystem::Accounting => &self.source_b,
        }
    }

    /// All records, source A first
    pub fn all_records(&self) -> impl Iterator<Item = &LedgerRecord> {
        self.source_a.iter().chain(self.source_b.iter())
    }

    pub(crate) fn records_mut(&mut self, source: SourceSystem) -> &mut [LedgerRecord] {
        match source {
            SourceSystem::TaxAuthority => &mut self.source_a,
            SourceSystem::Accounting => &mut self.source_b,
        }
    }

    /// Side and index of every record, for repeated lookups by id
    pub fn record_positions(&self) -> HashMap<RecordId, (SourceSystem, usize)> {
        self.all_records()
            .map(|r| r.record_id)
            .zip(
                (0..self.source_a.len())
                    .map(|i| (SourceSystem::TaxAuthority, i))
                    .chain((0..self.source_b.len()).map(|i| (SourceSystem::Accounting, i))),
            )
            .collect()
    }

    pub fn record(&self, record_id: RecordId) -> Option<&LedgerRecord> {
        self.all_records().find(|r| r.record_id == record_id)
    }

    pub fn record_mut(&mut self, record_id: RecordId) -> Option<&mut LedgerRecord> {
        self.source_a
            .iter_mut()
            .chain(self.source_b.iter_mut())
            .find(|r| r.record_id == record_id)
    }

    /// Members of the match group with the given identifier
    pub fn match_members(&self, match_id: &MatchId) -> Vec<&LedgerRecord> {
        self.all_records()
            .filter(|r| r.match_id.as_ref() == Some(match_id))
            .collect()
    }

    /// Attach an operator comment to a record; a blank comment clears it
    pub fn set_comment(&mut self, record_id: RecordId, comment: Option<&str>) -> ReconResult<()> {
        let record = self
            .record_mut(record_id)
            .ok_or(ReconError::RecordNotFound(record_id))?;
        record.comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);
        self.touch();
        Ok(())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().naive_utc();
    }
}

/// Lightweight listing entry for stored sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub name: String,
    pub status: SessionStatus,
    pub process_state: ProcessState,
    pub created_at: NaiveDateTime,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            name: session.name.clone(),
            status: session.status,
            process_state: session.process_state,
            created_at: session.created_at,
        }
    }
}

/// Errors that can occur during reconciliation
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),
}

/// Result type for reconciliation operations
pub type ReconResult<T> = Result<T, ReconError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_variant_survives_json() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let row = RawRecord::new()
            .with("as_text", "2024-03-01")
            .with("as_date", date)
            .with("as_number", 1500.5);

        let json = serde_json::to_string(&row).unwrap();
        let reloaded: RawRecord = serde_json::from_str(&json).unwrap();

        assert_eq!(reloaded, row);
        assert_eq!(reloaded.get("as_text"), Some(&RawValue::from("2024-03-01")));
        assert_eq!(reloaded.get("as_date"), Some(&RawValue::Date(date)));
    }

    #[test]
    fn test_record_positions() {
        let mut session = Session::import(
            "Positions",
            ColumnMapping::new("id", "amt", "id", "amt"),
            vec![RawRecord::new(), RawRecord::new()],
            vec![RawRecord::new()],
        )
        .unwrap();

        let positions = session.record_positions();
        assert_eq!(positions.len(), 3);
        assert_eq!(
            positions[&session.source_a[1].record_id],
            (SourceSystem::TaxAuthority, 1)
        );
        assert_eq!(
            positions[&session.source_b[0].record_id],
            (SourceSystem::Accounting, 0)
        );

        session.records_mut(SourceSystem::Accounting)[0].comment = Some("x".to_string());
        assert_eq!(session.source_b[0].comment.as_deref(), Some("x"));
    }
}
