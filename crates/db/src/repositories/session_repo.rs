//! Repository for the `sessions` table.
//!
//! Each method is a single statement, so the database provides the
//! atomicity the registry relies on. Connections are leased from the pool
//! per statement and returned when the query future completes or is dropped.

use async_trait::async_trait;
use peercode_core::session::Session;
use peercode_core::store::{SessionStore, StoreError};
use peercode_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::session::SessionRow;

/// Column list for `sessions` queries.
const COLUMNS: &str = "code, ip, created_at, updated_at, expires_at";

/// Provides statement-level access to the `sessions` table.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert a session unless its code is already taken.
    ///
    /// Any stored row with the same code counts as taken, expired or not.
    /// Returns `true` if the row was written.
    pub async fn insert_if_absent(pool: &PgPool, session: &Session) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO sessions (code, ip, created_at, updated_at, expires_at) \
             VALUES ($1, $2, $3, $3, $4) \
             ON CONFLICT (code) DO NOTHING",
        )
        .bind(&session.code)
        .bind(&session.ip)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Renew `code` to `expires_at`, only where the stored expiry is
    /// strictly before `now`.
    pub async fn renew_lapsed(
        pool: &PgPool,
        code: &str,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE sessions SET updated_at = $2, expires_at = $3 \
             WHERE code = $1 AND expires_at < $2",
        )
        .bind(code)
        .bind(now)
        .bind(expires_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete a session by code. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, code: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE code = $1")
            .bind(code)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Find a session by code that is still valid at `now`.
    pub async fn find_valid(
        pool: &PgPool,
        code: &str,
        now: Timestamp,
    ) -> Result<Option<SessionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions WHERE code = $1 AND expires_at > $2");
        sqlx::query_as::<_, SessionRow>(&query)
            .bind(code)
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// List every session, oldest first.
    pub async fn list(pool: &PgPool) -> Result<Vec<SessionRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM sessions ORDER BY created_at, code");
        sqlx::query_as::<_, SessionRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Delete every session that expired before `now`. Returns rows removed.
    pub async fn delete_expired(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// SessionStore adapter
// ---------------------------------------------------------------------------

/// [`SessionStore`] backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session) -> Result<bool, StoreError> {
        SessionRepo::insert_if_absent(&self.pool, session)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn keepalive(
        &self,
        code: &str,
        now: Timestamp,
        expires_at: Timestamp,
    ) -> Result<bool, StoreError> {
        SessionRepo::renew_lapsed(&self.pool, code, now, expires_at)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn delete(&self, code: &str) -> Result<bool, StoreError> {
        SessionRepo::delete(&self.pool, code)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn find_valid(&self, code: &str, now: Timestamp) -> Result<Option<Session>, StoreError> {
        let row = SessionRepo::find_valid(&self.pool, code, now)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(row.map(Session::from))
    }

    async fn list_by_created(&self) -> Result<Vec<Session>, StoreError> {
        let rows = SessionRepo::list(&self.pool)
            .await
            .map_err(classify_sqlx_error)?;
        Ok(rows.into_iter().map(Session::from).collect())
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        SessionRepo::delete_expired(&self.pool, now)
            .await
            .map_err(classify_sqlx_error)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool)
            .await
            .map_err(classify_sqlx_error)
    }
}

/// Split sqlx failures into decode problems and everything else.
///
/// Decode errors mean a row does not match [`SessionRow`]; all other
/// variants (I/O, pool timeout, TLS, protocol, database errors) are treated
/// as the store being unavailable.
fn classify_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::TypeNotFound { .. } => {
            tracing::error!(error = %err, "Malformed session row");
            StoreError::Malformed(err.to_string())
        }
        other => {
            tracing::error!(error = %other, "Session store error");
            StoreError::Unavailable(other.to_string())
        }
    }
}
