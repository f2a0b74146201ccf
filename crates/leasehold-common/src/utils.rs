//! Utility functions for Leasehold
//!
//! Time helpers shared by the store adapters and the lock protocol. Lease
//! expiry is persisted as epoch milliseconds.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{LockError, Result};

/// Current wall-clock time in milliseconds since the Unix epoch
///
/// # Examples
///
/// ```
/// use leasehold_common::current_timestamp;
///
/// assert!(current_timestamp() > 0);
/// ```
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Convert a lease duration into whole milliseconds for persistence
///
/// Fails when the duration does not fit in a signed 64-bit millisecond count.
pub fn duration_to_millis(duration: Duration) -> Result<i64> {
    i64::try_from(duration.as_millis())
        .map_err(|_| LockError::InvalidLease(format!("{:?} exceeds i64 milliseconds", duration)))
}
