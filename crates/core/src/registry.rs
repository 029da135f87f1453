//! Session lifecycle: create, keepalive, close, join, list.
//!
//! The registry holds no session state of its own. Every operation is one
//! call into the [`SessionStore`], and the caller passes `now` explicitly so
//! expiry checks are reproducible.

use std::sync::Arc;

use chrono::Duration;

use crate::error::{CoreError, CoreResult};
use crate::report::{self, SessionPartition};
use crate::session::{generate_code, Session};
use crate::store::SessionStoreRef;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default session lifetime: 6 minutes.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 360;

/// Longest session lifetime the registry accepts: 30 days.
pub const MAX_SESSION_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// Default number of code draws `create` makes before giving up.
pub const DEFAULT_MAX_CODE_ATTEMPTS: u32 = 5;

/// Message for `close` misses.
pub const MSG_NOT_FOUND: &str = "Session not found";

/// Message for `keepalive` and `join` misses.
pub const MSG_NOT_FOUND_OR_EXPIRED: &str = "Session not found or expired";

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct RegistrySettings {
    /// Added to `now` on create and keepalive to compute `expires_at`.
    pub ttl: Duration,
    /// Upper bound on code draws per `create`. Must be at least 1.
    pub max_code_attempts: u32,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            max_code_attempts: DEFAULT_MAX_CODE_ATTEMPTS,
        }
    }
}

/// Source of candidate session codes.
pub type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Result of a successful `create`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSession {
    pub code: String,
    pub expires_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct SessionRegistry {
    store: SessionStoreRef,
    settings: RegistrySettings,
    generate: CodeGenerator,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("store", &self.store)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    pub fn new(store: SessionStoreRef, settings: RegistrySettings) -> Self {
        Self {
            store,
            settings,
            generate: Arc::new(generate_code),
        }
    }

    /// Replace the code source. Used to force collisions in tests.
    pub fn with_code_generator(mut self, generate: CodeGenerator) -> Self {
        self.generate = generate;
        self
    }

    pub fn settings(&self) -> RegistrySettings {
        self.settings
    }

    /// Register `ip` under a fresh code valid until `now + ttl`.
    ///
    /// A draw that lands on any stored code, expired or not, is discarded and
    /// redrawn, since a lapsed owner can still renew it. After
    /// `max_code_attempts` draws the call fails with [`CoreError::Conflict`].
    pub async fn create(&self, ip: &str, now: Timestamp) -> CoreResult<CreatedSession> {
        let expires_at = self.expiry_from(now)?;

        for attempt in 1..=self.settings.max_code_attempts {
            let session = Session::new((self.generate)(), ip.to_string(), now, expires_at);

            if self.store.insert(&session).await? {
                tracing::info!(code = %session.code, attempt, %expires_at, "Session created");
                return Ok(CreatedSession {
                    code: session.code,
                    expires_at,
                });
            }

            tracing::warn!(code = %session.code, attempt, "Session code collision, redrawing");
        }

        Err(CoreError::Conflict(format!(
            "no free session code after {} attempts",
            self.settings.max_code_attempts
        )))
    }

    /// Extend a session to `now + ttl`.
    ///
    /// The store only applies the update when the stored `expires_at` is
    /// strictly before `now`, so a keepalive on a still-valid session is
    /// reported as not found. See DESIGN.md before changing this.
    pub async fn keepalive(&self, code: &str, now: Timestamp) -> CoreResult<Timestamp> {
        let expires_at = self.expiry_from(now)?;

        if self.store.keepalive(code, now, expires_at).await? {
            tracing::info!(code, %expires_at, "Session renewed");
            Ok(expires_at)
        } else {
            tracing::debug!(code, "Keepalive matched no session");
            Err(not_found(code, MSG_NOT_FOUND_OR_EXPIRED))
        }
    }

    /// Delete a session whether or not it has expired.
    pub async fn close(&self, code: &str) -> CoreResult<()> {
        if self.store.delete(code).await? {
            tracing::info!(code, "Session closed");
            Ok(())
        } else {
            Err(not_found(code, MSG_NOT_FOUND))
        }
    }

    /// Resolve a code to its IP, provided `now < expires_at`.
    pub async fn join(&self, code: &str, now: Timestamp) -> CoreResult<String> {
        match self.store.find_valid(code, now).await? {
            Some(session) => {
                tracing::debug!(code, "Session joined");
                Ok(session.ip)
            }
            None => Err(not_found(code, MSG_NOT_FOUND_OR_EXPIRED)),
        }
    }

    /// Snapshot of every stored session split into active and expired at `now`.
    pub async fn list(&self, now: Timestamp) -> CoreResult<SessionPartition> {
        let sessions = self.store.list_by_created().await?;
        Ok(report::partition(sessions, now))
    }

    /// Delete rows that expired before `now`. Housekeeping only.
    pub async fn sweep_expired(&self, now: Timestamp) -> CoreResult<u64> {
        Ok(self.store.purge_expired(now).await?)
    }

    fn expiry_from(&self, now: Timestamp) -> CoreResult<Timestamp> {
        now.checked_add_signed(self.settings.ttl).ok_or_else(|| {
            CoreError::Internal(format!(
                "session ttl of {}s overflows the timestamp range",
                self.settings.ttl.num_seconds()
            ))
        })
    }

    /// Whether the backing store answers.
    pub async fn store_healthy(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Session store ping failed");
                false
            }
        }
    }
}

fn not_found(code: &str, message: &'static str) -> CoreError {
    CoreError::NotFound {
        code: code.to_string(),
        message,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::memory::InMemorySessionStore;
    use crate::store::{SessionStore, StoreError};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap()
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            Arc::new(InMemorySessionStore::new()),
            RegistrySettings::default(),
        )
    }

    /// Hands out `codes` in order, then repeats the last one forever.
    fn scripted(codes: &[&str]) -> CodeGenerator {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(codes.iter().map(|c| c.to_string()).collect());
        let last = codes.last().map(|c| c.to_string()).unwrap_or_default();
        Arc::new(move || {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| last.clone())
        })
    }

    // -- create / join -----------------------------------------------------

    #[tokio::test]
    async fn create_then_join_returns_ip() {
        let reg = registry();
        let created = reg.create("10.0.0.5", t0()).await.unwrap();

        assert_eq!(created.expires_at, t0() + Duration::minutes(6));
        for offset in [0, 1, 180, 359] {
            let ip = reg
                .join(&created.code, t0() + Duration::seconds(offset))
                .await
                .unwrap();
            assert_eq!(ip, "10.0.0.5");
        }
    }

    #[tokio::test]
    async fn join_is_strict_at_expiry() {
        let reg = registry();
        let created = reg.create("10.0.0.5", t0()).await.unwrap();

        let just_before = created.expires_at - Duration::milliseconds(1);
        assert_eq!(reg.join(&created.code, just_before).await.unwrap(), "10.0.0.5");

        let err = reg.join(&created.code, created.expires_at).await.unwrap_err();
        assert_matches!(
            err,
            CoreError::NotFound { ref code, message } if *code == created.code && message == MSG_NOT_FOUND_OR_EXPIRED
        );
    }

    #[tokio::test]
    async fn join_unknown_code_is_not_found() {
        let reg = registry();
        assert_matches!(
            reg.join("ZZZZZZ", t0()).await,
            Err(CoreError::NotFound { message: MSG_NOT_FOUND_OR_EXPIRED, .. })
        );
    }

    #[tokio::test]
    async fn ip_payload_is_stored_verbatim() {
        let reg = registry();
        let created = reg.create("not really an ip", t0()).await.unwrap();
        assert_eq!(
            reg.join(&created.code, t0()).await.unwrap(),
            "not really an ip"
        );
    }

    // -- close -------------------------------------------------------------

    #[tokio::test]
    async fn close_is_terminal() {
        let reg = registry();
        let created = reg.create("10.0.0.5", t0()).await.unwrap();

        reg.close(&created.code).await.unwrap();

        assert_matches!(
            reg.join(&created.code, t0()).await,
            Err(CoreError::NotFound { .. })
        );
        assert_matches!(
            reg.close(&created.code).await,
            Err(CoreError::NotFound { message: MSG_NOT_FOUND, .. })
        );
    }

    #[tokio::test]
    async fn close_works_on_expired_session() {
        let reg = registry();
        let created = reg.create("10.0.0.5", t0()).await.unwrap();
        let late = t0() + Duration::hours(1);
        assert_eq!(reg.list(late).await.unwrap().expired.len(), 1);

        reg.close(&created.code).await.unwrap();
        assert!(reg.list(late).await.unwrap().expired.is_empty());
    }

    // -- keepalive ---------------------------------------------------------

    /// Locks in the inherited predicate: renewal only applies once the
    /// stored expiry is already in the past. This looks inverted and is
    /// tracked as an open question in DESIGN.md.
    #[tokio::test]
    async fn keepalive_only_renews_lapsed_sessions() {
        let reg = registry();
        let created = reg.create("10.0.0.5", t0()).await.unwrap();

        // Still fresh: predicate `expires_at < now` is false.
        assert_matches!(
            reg.keepalive(&created.code, t0() + Duration::minutes(1)).await,
            Err(CoreError::NotFound { message: MSG_NOT_FOUND_OR_EXPIRED, .. })
        );
        // Exactly at expiry: still not strictly before now.
        assert_matches!(
            reg.keepalive(&created.code, created.expires_at).await,
            Err(CoreError::NotFound { .. })
        );

        // Lapsed: renewal applies and the session becomes joinable again.
        let now = t0() + Duration::minutes(7);
        let renewed = reg.keepalive(&created.code, now).await.unwrap();
        assert_eq!(renewed, now + Duration::minutes(6));
        assert_eq!(reg.join(&created.code, now).await.unwrap(), "10.0.0.5");
    }

    #[tokio::test]
    async fn keepalive_keeps_created_at_and_moves_updated_at() {
        let reg = registry();
        let created = reg.create("10.0.0.5", t0()).await.unwrap();
        let now = t0() + Duration::minutes(10);
        reg.keepalive(&created.code, now).await.unwrap();

        let listed = reg.list(now).await.unwrap();
        let session = &listed.active[0];
        assert_eq!(session.created_at, t0());
        assert_eq!(session.updated_at, now);
        assert_eq!(session.expires_at, session.updated_at + reg.settings().ttl);
    }

    #[tokio::test]
    async fn keepalive_unknown_code_is_not_found() {
        let reg = registry();
        assert_matches!(
            reg.keepalive("ZZZZZZ", t0()).await,
            Err(CoreError::NotFound { .. })
        );
    }

    // -- code collisions ---------------------------------------------------

    #[tokio::test]
    async fn collision_with_live_code_is_redrawn() {
        let reg = registry().with_code_generator(scripted(&["AAAAAA", "AAAAAA", "BBBBBB"]));

        let first = reg.create("10.0.0.1", t0()).await.unwrap();
        let second = reg.create("10.0.0.2", t0()).await.unwrap();

        assert_eq!(first.code, "AAAAAA");
        assert_eq!(second.code, "BBBBBB");
        assert_eq!(reg.join("AAAAAA", t0()).await.unwrap(), "10.0.0.1");
        assert_eq!(reg.join("BBBBBB", t0()).await.unwrap(), "10.0.0.2");
    }

    #[tokio::test]
    async fn persistent_collision_fails_after_bounded_attempts() {
        let draws = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&draws);
        let reg = registry().with_code_generator(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            "AAAAAA".to_string()
        }));

        reg.create("10.0.0.1", t0()).await.unwrap();
        draws.store(0, Ordering::SeqCst);

        assert_matches!(
            reg.create("10.0.0.2", t0()).await,
            Err(CoreError::Conflict(_))
        );
        assert_eq!(draws.load(Ordering::SeqCst), DEFAULT_MAX_CODE_ATTEMPTS);
        // The live holder was not overwritten.
        assert_eq!(reg.join("AAAAAA", t0()).await.unwrap(), "10.0.0.1");
    }

    #[tokio::test]
    async fn expired_code_is_redrawn_and_old_session_survives() {
        let reg = registry().with_code_generator(scripted(&["AAAAAA", "AAAAAA", "BBBBBB"]));

        reg.create("10.0.0.1", t0()).await.unwrap();
        let later = t0() + Duration::minutes(7);
        assert_eq!(reg.list(later).await.unwrap().expired[0].code, "AAAAAA");

        let created = reg.create("10.0.0.2", later).await.unwrap();
        assert_eq!(created.code, "BBBBBB");

        let parts = reg.list(later).await.unwrap();
        assert_eq!(parts.expired.len(), 1);
        assert_eq!(parts.expired[0].ip, "10.0.0.1");

        // The lapsed owner can still renew and is still the one joined.
        reg.keepalive("AAAAAA", later).await.unwrap();
        assert_eq!(reg.join("AAAAAA", later).await.unwrap(), "10.0.0.1");
    }

    #[tokio::test]
    async fn concurrent_creates_yield_distinct_codes() {
        let reg = Arc::new(registry());

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let reg = Arc::clone(&reg);
                tokio::spawn(async move { reg.create(&format!("10.0.1.{i}"), t0()).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;
        let codes: HashSet<String> = results
            .into_iter()
            .map(|r| r.unwrap().unwrap().code)
            .collect();

        assert_eq!(codes.len(), 64);
    }

    // -- list --------------------------------------------------------------

    #[tokio::test]
    async fn list_partitions_relative_to_query_time() {
        let reg = registry().with_code_generator(scripted(&["OLD001", "NEW001"]));
        let ttl = reg.settings().ttl;
        let t = t0() + Duration::minutes(30);

        // expires_at = t - 10s and t + 10s respectively.
        reg.create("10.0.0.1", t - ttl - Duration::seconds(10))
            .await
            .unwrap();
        reg.create("10.0.0.2", t - ttl + Duration::seconds(10))
            .await
            .unwrap();

        let parts = reg.list(t).await.unwrap();
        assert_eq!(parts.expired.len(), 1);
        assert_eq!(parts.expired[0].code, "OLD001");
        assert_eq!(parts.active.len(), 1);
        assert_eq!(parts.active[0].code, "NEW001");
    }

    #[tokio::test]
    async fn list_does_not_mutate() {
        let reg = registry();
        reg.create("10.0.0.1", t0()).await.unwrap();

        let late = t0() + Duration::hours(1);
        assert_eq!(reg.list(late).await.unwrap().expired.len(), 1);
        assert_eq!(reg.list(late).await.unwrap().expired.len(), 1);
    }

    #[tokio::test]
    async fn sweep_removes_expired_only() {
        let reg = registry();
        reg.create("10.0.0.1", t0()).await.unwrap();
        reg.create("10.0.0.2", t0() + Duration::minutes(10)).await.unwrap();

        let removed = reg.sweep_expired(t0() + Duration::minutes(11)).await.unwrap();
        assert_eq!(removed, 1);

        let parts = reg.list(t0() + Duration::minutes(11)).await.unwrap();
        assert_eq!(parts.active.len(), 1);
        assert!(parts.expired.is_empty());
    }

    // -- end to end --------------------------------------------------------

    #[tokio::test]
    async fn full_lifecycle_scenario() {
        let reg = registry();

        let c1 = reg.create("10.0.0.5", t0()).await.unwrap();
        assert_eq!(c1.expires_at, t0() + Duration::minutes(6));

        assert_eq!(
            reg.join(&c1.code, t0() + Duration::minutes(1)).await.unwrap(),
            "10.0.0.5"
        );
        assert_matches!(
            reg.keepalive(&c1.code, t0() + Duration::minutes(1)).await,
            Err(CoreError::NotFound { .. })
        );
        assert_matches!(
            reg.join(&c1.code, t0() + Duration::minutes(7)).await,
            Err(CoreError::NotFound { .. })
        );
        reg.close(&c1.code).await.unwrap();
        assert_matches!(reg.close(&c1.code).await, Err(CoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn oversized_ttl_is_an_error_not_a_panic() {
        let store = Arc::new(InMemorySessionStore::new());
        let reg = SessionRegistry::new(
            store.clone(),
            RegistrySettings {
                // Well past chrono's representable range.
                ttl: Duration::days(365 * 1_000_000),
                max_code_attempts: 1,
            },
        );

        assert_matches!(reg.create("10.0.0.1", t0()).await, Err(CoreError::Internal(_)));
        assert_matches!(reg.keepalive("AAAAAA", t0()).await, Err(CoreError::Internal(_)));
        assert!(store.is_empty().await);
    }

    // -- store failures ----------------------------------------------------

    #[derive(Debug)]
    struct DownStore;

    #[async_trait]
    impl SessionStore for DownStore {
        async fn insert(&self, _: &Session) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn keepalive(&self, _: &str, _: Timestamp, _: Timestamp) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn delete(&self, _: &str) -> Result<bool, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn find_valid(&self, _: &str, _: Timestamp) -> Result<Option<Session>, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn list_by_created(&self) -> Result<Vec<Session>, StoreError> {
            Err(StoreError::Malformed("bad row".into()))
        }
        async fn purge_expired(&self, _: Timestamp) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
        async fn ping(&self) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn store_failures_propagate_without_retry() {
        let reg = SessionRegistry::new(Arc::new(DownStore), RegistrySettings::default());

        assert_matches!(
            reg.create("10.0.0.1", t0()).await,
            Err(CoreError::StoreUnavailable(_))
        );
        assert_matches!(
            reg.keepalive("AAAAAA", t0()).await,
            Err(CoreError::StoreUnavailable(_))
        );
        assert_matches!(reg.close("AAAAAA").await, Err(CoreError::StoreUnavailable(_)));
        assert_matches!(
            reg.join("AAAAAA", t0()).await,
            Err(CoreError::StoreUnavailable(_))
        );
        assert_matches!(reg.list(t0()).await, Err(CoreError::Internal(_)));
        assert!(!reg.store_healthy().await);
    }
}
