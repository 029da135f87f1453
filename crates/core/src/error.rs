use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The code does not exist or fails the operation's validity predicate.
    #[error("{message}: {code}")]
    NotFound { code: String, message: &'static str },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias for registry results.
pub type CoreResult<T> = Result<T, CoreError>;

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoreError::StoreUnavailable(msg),
            StoreError::Malformed(msg) => CoreError::Internal(msg),
        }
    }
}
