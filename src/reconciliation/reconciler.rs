//! Session orchestrator that ties the engine to a storage backend

use bigdecimal::BigDecimal;

use crate::config::ReconConfig;
use crate::reconciliation::auto_match::auto_match_session;
use crate::reconciliation::discrepancy::{discrepancy_report, DiscrepancyReport};
use crate::traits::*;
use crate::types::*;

/// How a session should be written back to storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveMode {
    /// Replace the stored snapshot of the same session
    Update,
    /// Store a copy under a fresh identifier and the given name
    AsNew { name: String },
}

/// Main reconciler that coordinates sessions, matching and storage
///
/// The engine functions never touch storage; the reconciler loads a session,
/// runs them, and writes the result back through the [`SessionStore`].
pub struct Reconciler<S: SessionStore> {
    storage: S,
    validator: Box<dyn SessionValidator>,
    config: ReconConfig,
}

impl<S: SessionStore> Reconciler<S> {
    /// Create a new reconciler with the given storage backend
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultSessionValidator),
            config: ReconConfig::default(),
        }
    }

    /// Create a new reconciler with a custom validator
    pub fn with_validator(storage: S, validator: Box<dyn SessionValidator>) -> Self {
        Self {
            storage,
            validator,
            config: ReconConfig::default(),
        }
    }

    /// Replace the configuration, builder style
    pub fn with_config(mut self, config: ReconConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Create and store a session from two freshly ingested files
    pub async fn import_session(
        &mut self,
        name: &str,
        mapping: ColumnMapping,
        rows_a: Vec<RawRecord>,
        rows_b: Vec<RawRecord>,
    ) -> ReconResult<Session> {
        let session = Session::import(name, mapping, rows_a, rows_b)?;
        self.validator.validate_session(&session)?;
        self.storage.create_session(&session).await?;

        tracing::info!(
            session = %session.id,
            name = %session.name,
            records_a = session.source_a.len(),
            records_b = session.source_b.len(),
            "Session imported"
        );
        Ok(session)
    }

    /// List stored sessions
    pub async fn list_sessions(&self) -> ReconResult<Vec<SessionSummary>> {
        self.storage.list_sessions().await
    }

    /// Load a session by ID, returning an error if not found
    pub async fn open_session(&self, session_id: SessionId) -> ReconResult<Session> {
        self.storage
            .load_session(session_id)
            .await?
            .ok_or(ReconError::SessionNotFound(session_id))
    }

    /// Run automatic matching on a stored session and persist the outcome
    pub async fn process_session(&mut self, session_id: SessionId) -> ReconResult<Session> {
        let mut session = self.open_session(session_id).await?;
        self.validator.validate_session(&session)?;

        let matches = auto_match_session(&mut session);
        self.storage.replace_session(&session).await?;

        tracing::info!(
            session = %session.id,
            matches = matches.len(),
            "Automatic reconciliation stored"
        );
        Ok(session)
    }

    /// Write an in-memory session back to storage.
    ///
    /// `SaveMode::Update` replaces the stored snapshot in one atomic call.
    /// `SaveMode::AsNew` stores a copy under a new identifier and returns it.
    /// On error the caller's session is left exactly as it was.
    pub async fn save_session(
        &mut self,
        session: &Session,
        mode: SaveMode,
    ) -> ReconResult<Session> {
        let mut to_store = session.clone();
        match mode {
            SaveMode::Update => {
                to_store.name = crate::utils::validate_session_name(&session.name)?;
                to_store.touch();
                self.validator.validate_session(&to_store)?;
                self.storage.replace_session(&to_store).await?;
            }
            SaveMode::AsNew { name } => {
                to_store.id = SessionId::new();
                to_store.name = crate::utils::validate_session_name(&name)?;
                to_store.created_at = chrono::Utc::now().naive_utc();
                to_store.updated_at = to_store.created_at;
                self.validator.validate_session(&to_store)?;
                self.storage.create_session(&to_store).await?;
            }
        }

        tracing::info!(session = %to_store.id, name = %to_store.name, "Session saved");
        Ok(to_store)
    }

    /// Rename a stored session
    pub async fn rename_session(&mut self, session_id: SessionId, name: &str) -> ReconResult<()> {
        let name = crate::utils::validate_session_name(name)?;
        self.storage.rename_session(session_id, &name).await
    }

    /// Delete a stored session
    pub async fn delete_session(&mut self, session_id: SessionId) -> ReconResult<()> {
        self.storage.delete_session(session_id).await?;
        tracing::info!(session = %session_id, "Session deleted");
        Ok(())
    }

    /// Discrepancy report using the configured default threshold
    pub fn default_discrepancies(&self, session: &Session) -> DiscrepancyReport {
        discrepancy_report(session, &self.config.default_discrepancy_threshold)
    }

    /// Discrepancy report with an operator-chosen threshold
    pub fn discrepancies(&self, session: &Session, threshold: &BigDecimal) -> DiscrepancyReport {
        discrepancy_report(session, threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemorySessionStore;

    fn rows() -> (Vec<RawRecord>, Vec<RawRecord>) {
        let a = vec![
            RawRecord::new().with("CUIT", "20-1").with("Monto", 100.0),
            RawRecord::new().with("CUIT", "20-2").with("Monto", 50.0),
        ];
        let b = vec![
            RawRecord::new().with("CUIT", "201").with("Credito", "100,00"),
            RawRecord::new().with("CUIT", "202").with("Credito", "45,00"),
        ];
        (a, b)
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::new("CUIT", "Monto", "CUIT", "Credito")
    }

    #[tokio::test]
    async fn test_reconciler_basic_operations() {
        let storage = MemorySessionStore::new();
        let mut reconciler = Reconciler::new(storage);
        let (a, b) = rows();

        let imported = reconciler
            .import_session("January", mapping(), a, b)
            .await
            .unwrap();
        assert_eq!(imported.process_state, ProcessState::Imported);

        let processed = reconciler.process_session(imported.id).await.unwrap();
        assert_eq!(processed.process_state, ProcessState::Finished);
        assert_eq!(processed.source_a[0].status, RecordStatus::Reconciled);
        assert!(processed.source_a[1].is_pending());

        let stored = reconciler.open_session(imported.id).await.unwrap();
        assert_eq!(stored, processed);

        let report = reconciler.default_discrepancies(&stored);
        assert_eq!(report.providers_found, 2);
        assert_eq!(report.entries[0].identifier, "202");
    }

    #[tokio::test]
    async fn test_import_rejects_blank_name_without_storing() {
        let storage = MemorySessionStore::new();
        let mut reconciler = Reconciler::new(storage.clone());
        let (a, b) = rows();

        let err = reconciler
            .import_session("  ", mapping(), a, b)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconError::Validation(_)));
        assert!(storage.is_empty());
    }

    #[tokio::test]
    async fn test_save_as_new_keeps_original() {
        let storage = MemorySessionStore::new();
        let mut reconciler = Reconciler::new(storage.clone());
        let (a, b) = rows();
        let session = reconciler
            .import_session("Original", mapping(), a, b)
            .await
            .unwrap();

        let copy = reconciler
            .save_session(
                &session,
                SaveMode::AsNew {
                    name: "Copy".to_string(),
                },
            )
            .await
            .unwrap();
        assert_ne!(copy.id, session.id);
        assert_eq!(storage.len(), 2);
        assert_eq!(reconciler.open_session(session.id).await.unwrap().name, "Original");
    }

    #[tokio::test]
    async fn test_missing_session() {
        let mut reconciler = Reconciler::new(MemorySessionStore::new());
        let id = SessionId::new();
        assert!(matches!(
            reconciler.process_session(id).await,
            Err(ReconError::SessionNotFound(_))
        ));
        assert!(reconciler.rename_session(id, "x").await.is_err());
    }
}
