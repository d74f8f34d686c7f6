//! Traits for storage abstraction and extensibility

use async_trait::async_trait;

use crate::types::*;

/// Storage abstraction for reconciliation sessions
///
/// This trait allows the reconciliation core to work with any storage backend
/// (PostgreSQL, SQLite, a hosted REST store, in-memory, etc.) by implementing
/// these methods. A session is always written as a whole: implementations
/// must make `replace_session` atomic so that a failure leaves the previously
/// stored snapshot intact.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session together with all of its records
    async fn create_session(&mut self, session: &Session) -> ReconResult<()>;

    /// Load a session and its records by ID
    async fn load_session(&self, session_id: SessionId) -> ReconResult<Option<Session>>;

    /// List stored sessions, most recently created first
    async fn list_sessions(&self) -> ReconResult<Vec<SessionSummary>>;

    /// Atomically replace the stored snapshot of an existing session
    async fn replace_session(&mut self, session: &Session) -> ReconResult<()>;

    /// Change the display name of a stored session
    async fn rename_session(&mut self, session_id: SessionId, name: &str) -> ReconResult<()>;

    /// Delete a session and all of its records
    async fn delete_session(&mut self, session_id: SessionId) -> ReconResult<()>;
}

/// Trait for implementing custom session validation rules
pub trait SessionValidator: Send + Sync {
    /// Validate a session before it is stored
    fn validate_session(&self, session: &Session) -> ReconResult<()>;
}

/// Default session validator with basic rules
pub struct DefaultSessionValidator;

impl SessionValidator for DefaultSessionValidator {
    fn validate_session(&self, session: &Session) -> ReconResult<()> {
        crate::utils::validate_session_name(&session.name)?;
        crate::utils::validate_mapping(&session.mapping)?;
        Ok(())
    }
}
