//! Error types for Leasehold lock operations

/// Errors surfaced by distributed lock operations.
///
/// Store connectivity and query failures never surface from the
/// acquire/renew/release paths: the lease session converts them into a failed
/// attempt. `Store` only carries failures of operator tooling.
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("lock acquisition interrupted")]
    Interrupted,

    #[error("current holder does not own local lock '{lock_key}'")]
    NotOwner { lock_key: String },

    #[error("lease '{lock_key}' at version {version} can no longer be renewed")]
    CannotRenew { lock_key: String, version: i64 },

    #[error("invalid lease: {0}")]
    InvalidLease(String),

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl LockError {
    /// Whether this error means the lease was lost and renewal must stop.
    pub fn is_renew_impossible(&self) -> bool {
        matches!(self, LockError::CannotRenew { .. })
    }
}

pub type Result<T> = std::result::Result<T, LockError>;
