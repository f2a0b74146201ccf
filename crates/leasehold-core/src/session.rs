//! Lease session: optimistic-versioned acquire/renew/release of one lease
//!
//! A session is created for every outermost acquisition and lives until the
//! matching release. The version it carries is the compare-and-swap token for
//! every write; a writer whose expected version no longer matches has lost the
//! lease and must not believe it holds it.
//!
//! Store failures never escape the session. They are logged and reported as a
//! failed attempt, which is always safe to retry from scratch.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

use leasehold_common::{LockError, Result, current_timestamp, duration_to_millis};
use leasehold_persistence::LockStore;
use tracing::{debug, error, info, warn};

pub struct LeaseSession {
    store: Arc<dyn LockStore>,
    lock_key: String,
    version: AtomicI64,
    lost: AtomicBool,
}

impl LeaseSession {
    pub fn new(store: Arc<dyn LockStore>, lock_key: impl Into<String>) -> Self {
        Self {
            store,
            lock_key: lock_key.into(),
            version: AtomicI64::new(0),
            lost: AtomicBool::new(false),
        }
    }

    pub fn lock_key(&self) -> &str {
        &self.lock_key
    }

    /// Last version written by this session, 0 before the first acquisition
    pub fn version(&self) -> i64 {
        self.version.load(Ordering::Acquire)
    }

    /// Whether a renewal found the lease deleted or taken over
    pub fn is_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Make one attempt to obtain the lease for `lease`
    ///
    /// Creates the record when absent, or takes over a record whose lease has
    /// expired. Returns `false` when the lease is live elsewhere, a concurrent
    /// writer won, or the store failed.
    pub async fn try_acquire(&self, lease: Duration) -> bool {
        let lease_ms = match duration_to_millis(lease) {
            Ok(ms) => ms,
            Err(e) => {
                error!(lock_key = %self.lock_key, error = %e, "Rejected lease duration");
                return false;
            }
        };

        match self.acquire_once(lease_ms).await {
            Ok(acquired) => acquired,
            Err(e) => {
                error!(lock_key = %self.lock_key, error = %e, "Failed to acquire lease");
                false
            }
        }
    }

    async fn acquire_once(&self, lease_ms: i64) -> anyhow::Result<bool> {
        let now = current_timestamp();
        let expired_time = now.saturating_add(lease_ms);

        match self.store.find(&self.lock_key).await? {
            None => {
                if self
                    .store
                    .insert_if_absent(&self.lock_key, expired_time)
                    .await?
                {
                    self.adopt(1);
                    debug!(
                        lock_key = %self.lock_key,
                        version = 1,
                        expired_time,
                        "Created lease"
                    );
                    Ok(true)
                } else {
                    debug!(lock_key = %self.lock_key, "Lost creation race");
                    Ok(false)
                }
            }
            Some(record) if record.is_live(now) => {
                debug!(
                    lock_key = %self.lock_key,
                    version = record.version,
                    expired_time = record.expired_time,
                    "Lease is held elsewhere"
                );
                Ok(false)
            }
            Some(record) => {
                let rows = self
                    .store
                    .update_if_version(&self.lock_key, record.version, expired_time)
                    .await?;
                if rows == 0 {
                    debug!(
                        lock_key = %self.lock_key,
                        version = record.version,
                        "Lost takeover race"
                    );
                    return Ok(false);
                }

                let version = record.version + 1;
                self.adopt(version);
                info!(
                    lock_key = %self.lock_key,
                    version,
                    previous_expired_time = record.expired_time,
                    expired_time,
                    "Took over expired lease"
                );
                Ok(true)
            }
        }
    }

    /// Push expiry to `now + extend` under the current version
    ///
    /// `Ok(false)` is a transient store failure; the next renewal may succeed.
    /// `Err(LockError::CannotRenew)` means the record is gone or was taken
    /// over, and the session is marked lost.
    pub async fn try_renew(&self, extend: Duration) -> Result<bool> {
        let extend_ms = duration_to_millis(extend)?;
        let version = self.version();
        let expired_time = current_timestamp().saturating_add(extend_ms);

        match self
            .store
            .update_if_version(&self.lock_key, version, expired_time)
            .await
        {
            Ok(0) => {
                self.lost.store(true, Ordering::Release);
                warn!(
                    lock_key = %self.lock_key,
                    version,
                    "Lease can no longer be renewed, it was deleted or taken over"
                );
                Err(LockError::CannotRenew {
                    lock_key: self.lock_key.clone(),
                    version,
                })
            }
            Ok(_) => {
                self.adopt(version + 1);
                debug!(
                    lock_key = %self.lock_key,
                    version = version + 1,
                    expired_time,
                    "Renewed lease"
                );
                Ok(true)
            }
            Err(e) => {
                error!(lock_key = %self.lock_key, version, error = %e, "Failed to renew lease");
                Ok(false)
            }
        }
    }

    /// Delete the record under the current version
    ///
    /// A miss is logged and not escalated: the release is complete from the
    /// caller's side either way.
    pub async fn try_release(&self) -> bool {
        let version = self.version();

        match self.store.delete_if_version(&self.lock_key, version).await {
            Ok(0) => {
                warn!(
                    lock_key = %self.lock_key,
                    version,
                    "Lease record was not deleted, it expired and was taken over or was modified externally"
                );
                false
            }
            Ok(_) => {
                debug!(lock_key = %self.lock_key, version, "Released lease");
                true
            }
            Err(e) => {
                error!(lock_key = %self.lock_key, version, error = %e, "Failed to release lease");
                false
            }
        }
    }

    fn adopt(&self, version: i64) {
        self.version.store(version, Ordering::Release);
    }
}

impl std::fmt::Debug for LeaseSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseSession")
            .field("lock_key", &self.lock_key)
            .field("version", &self.version())
            .field("lost", &self.is_lost())
            .field("storage_mode", &self.store.storage_mode())
            .finish()
    }
}
