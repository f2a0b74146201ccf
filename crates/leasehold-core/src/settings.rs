//! Lock timing settings

use std::time::Duration;

use leasehold_common::{
    DEFAULT_LEASE_TIME, DEFAULT_RETRY_BACKOFF, LockError, MIN_LEASE_TIME, RENEWALS_PER_LEASE,
    Result, duration_to_millis,
};

/// Timing parameters shared by every lock of a provider
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockSettings {
    /// Lease used by operations that take no explicit lease
    pub default_lease: Duration,
    /// Pause between store attempts while waiting
    pub retry_backoff: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            default_lease: DEFAULT_LEASE_TIME,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl LockSettings {
    pub fn new(default_lease: Duration, retry_backoff: Duration) -> Self {
        Self {
            default_lease,
            retry_backoff,
        }
    }
}

/// Check a lease and derive its renewal interval
pub fn renewal_interval(lease: Duration) -> Result<Duration> {
    if lease < MIN_LEASE_TIME {
        return Err(LockError::InvalidLease(format!(
            "{:?} is shorter than the minimum of {:?}",
            lease, MIN_LEASE_TIME
        )));
    }
    duration_to_millis(lease)?;
    Ok(lease / RENEWALS_PER_LEASE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = LockSettings::default();
        assert_eq!(settings.default_lease, Duration::from_secs(60));
        assert_eq!(settings.retry_backoff, Duration::from_secs(5));
    }

    #[test]
    fn test_renewal_interval() {
        assert_eq!(
            renewal_interval(Duration::from_secs(60)).unwrap(),
            Duration::from_secs(20)
        );
        assert_eq!(
            renewal_interval(Duration::from_millis(3)).unwrap(),
            Duration::from_millis(1)
        );
    }

    #[test]
    fn test_rejects_unusable_leases() {
        assert!(matches!(
            renewal_interval(Duration::from_millis(2)),
            Err(LockError::InvalidLease(_))
        ));
        assert!(matches!(
            renewal_interval(Duration::ZERO),
            Err(LockError::InvalidLease(_))
        ));
        assert!(matches!(
            renewal_interval(Duration::MAX),
            Err(LockError::InvalidLease(_))
        ));
    }
}
