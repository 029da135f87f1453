//! In-process [`SessionStore`] used by tests and `STORE_BACKEND=memory`.
//!
//! Each method holds the write (or read) lock for its whole body, which
//! gives the same single-statement atomicity the PostgreSQL store gets from
//! the database.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::session::Session;
use crate::store::{SessionStore, StoreError};
use crate::types::Timestamp;

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, live or expired.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: &Session) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.write().await;

        if sessions.contains_key(&session.code) {
            return Ok(false);
        }

        sessions.insert(session.code.clone(), session.clone());
        Ok(true)
    }

    async fn keepalive(
        &self,
        code: &str,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.write().await;

        match sessions.get_mut(code) {
            Some(session) if session.expires_at < now => {
                session.updated_at = now;
                session.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(code).is_some())
    }

    async fn find_valid(&self, code: &str, now: Timestamp) -> Result<Option<Session>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(code).filter(|s| s.is_valid_at(now)).cloned())
    }

    async fn list_by_created(&self) -> Result<Vec<Session>, StoreError> {
        let sessions = self.sessions.read().await;
        let mut rows: Vec<Session> = sessions.values().cloned().collect();
        rows.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.code.cmp(&b.code))
        });
        Ok(rows)
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - sessions.len()) as u64)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
