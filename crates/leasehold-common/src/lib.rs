//! Leasehold Common - Shared types and utilities
//!
//! This crate provides the foundational types used across all Leasehold components:
//! - The `LockError` type surfaced by lock operations
//! - Lease and retry constants
//! - Epoch-millisecond time helpers

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::{LockError, Result};
pub use utils::{current_timestamp, duration_to_millis};

use std::time::Duration;

/// Lease duration used when the caller does not specify one
pub const DEFAULT_LEASE_TIME: Duration = Duration::from_secs(60);

/// Pause between two store acquisition attempts while waiting for a lock
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Shortest accepted lease; the renewal interval is a third of the lease and
/// must not round down to zero
pub const MIN_LEASE_TIME: Duration = Duration::from_millis(3);

/// Number of renewals scheduled per lease period
pub const RENEWALS_PER_LEASE: u32 = 3;

/// Name of the backing table
pub const LOCK_TABLE: &str = "distributed_lock";
