//! The session record and its short join code.

use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Number of characters in a session code.
pub const CODE_LENGTH: usize = 6;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// A code-to-IP binding with a bounded validity window.
///
/// `ip` is an opaque payload supplied by the creator and is never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub code: String,
    pub ip: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub expires_at: Timestamp,
}

impl Session {
    /// Build a brand-new record: `created_at == updated_at == now`.
    pub fn new(code: String, ip: String, now: Timestamp, expires_at: Timestamp) -> Self {
        Self {
            code,
            ip,
            created_at: now,
            updated_at: now,
            expires_at,
        }
    }

    /// Whether the session may still be joined at `now` (`now < expires_at`).
    pub fn is_valid_at(&self, now: Timestamp) -> bool {
        now < self.expires_at
    }

    /// Whether the session belongs in the expired bucket of a listing
    /// taken at `now` (`expires_at < now`).
    ///
    /// Note that at `now == expires_at` a session is neither joinable nor
    /// listed as expired.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at < now
    }
}

// ---------------------------------------------------------------------------
// Codes
// ---------------------------------------------------------------------------

/// Draw a fresh session code.
///
/// The code is the leading [`CODE_LENGTH`] hex digits of a random v4 UUID,
/// uppercased. The space is 16^6 codes, so collisions are rare but must be
/// handled by the caller.
pub fn generate_code() -> String {
    let mut code = uuid::Uuid::new_v4().simple().to_string();
    code.truncate(CODE_LENGTH);
    code.make_ascii_uppercase();
    code
}

/// Canonical form of a code typed by a human: trimmed and uppercased.
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
