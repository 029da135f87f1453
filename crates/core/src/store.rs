//! The record-store seam behind the registry.
//!
//! Every method maps to one atomic statement on the backing store. The
//! registry never reads-then-writes, so concurrent requests for the same
//! code always land in one of the well-defined end states.

use std::sync::Arc;

use async_trait::async_trait;

use crate::session::Session;
use crate::types::Timestamp;

/// Failure talking to the record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Connection, pool, or transport failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded into a [`Session`].
    #[error("malformed session record: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Insert `session` keyed by its code.
    ///
    /// Returns `false` and writes nothing when any record, live or expired,
    /// already holds the code.
    async fn insert(&self, session: &Session) -> Result<bool, StoreError>;

    /// Set `updated_at = now` and `expires_at` on the record for `code`,
    /// but only if its stored `expires_at` is strictly before `now`.
    ///
    /// Returns whether a record matched.
    async fn keepalive(
        &self,
        code: &str,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Result<bool, StoreError>;

    /// Delete the record for `code` regardless of expiry. Returns whether a
    /// record was removed.
    async fn delete(&self, code: &str) -> Result<bool, StoreError>;

    /// Fetch the record for `code` if `expires_at > now`.
    async fn find_valid(&self, code: &str, now: Timestamp) -> Result<Option<Session>, StoreError>;

    /// All records ordered by `created_at` ascending (ties by code).
    async fn list_by_created(&self) -> Result<Vec<Session>, StoreError>;

    /// Delete every record with `expires_at < now`. Returns the count removed.
    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError>;

    /// Cheap round-trip used by health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Shared handle to a store implementation.
pub type SessionStoreRef = Arc<dyn SessionStore>;
