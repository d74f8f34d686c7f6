//! In-memory storage implementation for testing

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::traits::*;
use crate::types::*;

/// In-memory session store for testing and development
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

fn poisoned<E>(_: E) -> ReconError {
    ReconError::Persistence("session store lock poisoned".to_string())
}

impl MemorySessionStore {
    /// Create a new memory store instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> ReconResult<()> {
        self.sessions.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&mut self, session: &Session) -> ReconResult<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        if sessions.contains_key(&session.id) {
            return Err(ReconError::Persistence(format!(
                "Session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn load_session(&self, session_id: SessionId) -> ReconResult<Option<Session>> {
        Ok(self
            .sessions
            .read()
            .map_err(poisoned)?
            .get(&session_id)
            .cloned())
    }

    async fn list_sessions(&self) -> ReconResult<Vec<SessionSummary>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        let mut summaries: Vec<SessionSummary> =
            sessions.values().map(SessionSummary::from).collect();
        summaries.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(summaries)
    }

    async fn replace_session(&mut self, session: &Session) -> ReconResult<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        match sessions.get_mut(&session.id) {
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => Err(ReconError::SessionNotFound(session.id)),
        }
    }

    async fn rename_session(&mut self, session_id: SessionId, name: &str) -> ReconResult<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        let stored = sessions
            .get_mut(&session_id)
            .ok_or(ReconError::SessionNotFound(session_id))?;
        stored.name = name.to_string();
        stored.touch();
        Ok(())
    }

    async fn delete_session(&mut self, session_id: SessionId) -> ReconResult<()> {
        if self
            .sessions
            .write()
            .map_err(poisoned)?
            .remove(&session_id)
            .is_some()
        {
            Ok(())
        } else {
            Err(ReconError::SessionNotFound(session_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(name: &str) -> Session {
        Session::new(name, ColumnMapping::new("a", "b", "c", "d"))
    }

    #[tokio::test]
    async fn test_create_and_load() {
        let mut store = MemorySessionStore::new();
        let s = session("one");
        store.create_session(&s).await.unwrap();

        assert_eq!(store.load_session(s.id).await.unwrap(), Some(s.clone()));
        assert!(store.create_session(&s).await.is_err());
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_replace_requires_existing_session() {
        let mut store = MemorySessionStore::new();
        let s = session("missing");
        assert!(matches!(
            store.replace_session(&s).await,
            Err(ReconError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_rename_and_delete() {
        let mut store = MemorySessionStore::new();
        let s = session("old");
        store.create_session(&s).await.unwrap();

        store.rename_session(s.id, "new").await.unwrap();
        let listed = store.list_sessions().await.unwrap();
        assert_eq!(listed[0].name, "new");

        store.delete_session(s.id).await.unwrap();
        assert!(store.is_empty());
        assert!(store.delete_session(s.id).await.is_err());
    }
}
