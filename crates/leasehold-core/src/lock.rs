//! Distributed lock: local reentrant exclusion composed with a remote lease
//!
//! Every acquisition runs two phases. The local phase serializes holders of
//! the same `LeaseLock` inside the process and short-circuits reentrant calls.
//! The store phase runs only for the outermost hold and retries the lease
//! session until it wins, the wait budget is spent, or the caller is
//! interrupted. A won lease is kept alive by a watchdog until `unlock`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use leasehold_common::{LockError, Result};
use leasehold_persistence::LockStore;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::interrupt::Interrupt;
use crate::local::{Acquisition, HolderId, LocalHoldGuard, ReentrantLocalLock};
use crate::session::LeaseSession;
use crate::settings::{LockSettings, renewal_interval};
use crate::watchdog::Watchdog;

/// Condition variables are not supported by lease locks; this type has no
/// values.
#[derive(Debug)]
pub enum Condition {}

/// State of the remote lease as seen by this lock instance
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaseStatus {
    /// No outstanding hold
    Unheld,
    /// Held and renewing
    Held,
    /// Still held locally, but a renewal found the record deleted or taken
    /// over; exclusion is no longer guaranteed
    Lost,
}

/// Mutual exclusion across processes sharing one lock store
///
/// Reentrancy is per holder (tokio task, or thread outside a task): a holder
/// that already owns the lock succeeds immediately and must call `unlock` once
/// per successful acquisition. Lease and wait arguments only matter for the
/// outermost acquisition.
#[async_trait]
pub trait DistributedLock: Send + Sync {
    fn lock_key(&self) -> &str;

    /// Lease used by the operations that take none
    fn default_lease(&self) -> Duration;

    /// Wait without bound for the lock, with the default lease
    async fn lock(&self) -> Result<()> {
        self.lock_with_lease(self.default_lease()).await
    }

    /// Wait without bound for the lock
    ///
    /// Fails only with `InvalidLease`.
    async fn lock_with_lease(&self, lease: Duration) -> Result<()>;

    async fn lock_interruptibly(&self, interrupt: &Interrupt) -> Result<()> {
        self.lock_interruptibly_with_lease(self.default_lease(), interrupt)
            .await
    }

    /// Wait without bound for the lock until `interrupt` is raised
    async fn lock_interruptibly_with_lease(
        &self,
        lease: Duration,
        interrupt: &Interrupt,
    ) -> Result<()>;

    /// Take the lock only if it is free locally and one store attempt wins
    async fn try_lock(&self) -> Result<bool>;

    async fn try_lock_for(&self, wait: Duration, interrupt: &Interrupt) -> Result<bool> {
        self.try_lock_for_with_lease(wait, self.default_lease(), interrupt)
            .await
    }

    /// Wait at most `wait` for the lock
    ///
    /// `Ok(false)` on timeout, `Err(Interrupted)` when `interrupt` is raised.
    async fn try_lock_for_with_lease(
        &self,
        wait: Duration,
        lease: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool>;

    /// Drop one hold; the last one stops renewal and deletes the record
    async fn unlock(&self) -> Result<()>;

    fn new_condition(&self) -> Result<Condition>;
}

struct HeldLease {
    session: Arc<LeaseSession>,
    watchdog: Watchdog,
}

enum Wait<'a> {
    Immediate,
    Unbounded,
    Interruptible(&'a Interrupt),
    Until(Instant, &'a Interrupt),
}

impl<'a> Wait<'a> {
    fn interrupt(&self) -> Option<&'a Interrupt> {
        match self {
            Wait::Interruptible(interrupt) | Wait::Until(_, interrupt) => Some(*interrupt),
            Wait::Immediate | Wait::Unbounded => None,
        }
    }
}

/// Lease-based `DistributedLock` over a `LockStore`
pub struct LeaseLock {
    lock_key: String,
    store: Arc<dyn LockStore>,
    settings: LockSettings,
    local: ReentrantLocalLock,
    held: Mutex<Option<HeldLease>>,
}

impl LeaseLock {
    pub fn new(
        store: Arc<dyn LockStore>,
        lock_key: impl Into<String>,
        settings: LockSettings,
    ) -> Self {
        Self {
            lock_key: lock_key.into(),
            store,
            settings,
            local: ReentrantLocalLock::new(),
            held: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }

    pub fn lease_status(&self) -> LeaseStatus {
        match self.held.lock().as_ref() {
            None => LeaseStatus::Unheld,
            Some(held) if held.session.is_lost() => LeaseStatus::Lost,
            Some(_) => LeaseStatus::Held,
        }
    }

    /// Store version of the current lease, if held
    pub fn held_version(&self) -> Option<i64> {
        self.held
            .lock()
            .as_ref()
            .map(|held| held.session.version())
    }

    /// Whether any holder in this process owns the lock
    pub fn is_locked(&self) -> bool {
        self.local.is_locked()
    }

    pub fn is_held_by_current(&self) -> bool {
        self.hold_count() > 0
    }

    /// Outstanding holds of the calling holder
    pub fn hold_count(&self) -> usize {
        self.local.hold_count(HolderId::current())
    }

    async fn acquire(&self, lease: Duration, wait: Wait<'_>) -> Result<bool> {
        let interval = renewal_interval(lease)?;

        if let Some(interrupt) = wait.interrupt()
            && interrupt.take()
        {
            return Err(LockError::Interrupted);
        }

        let holder = HolderId::current();
        let Some(acquisition) = self.acquire_local(holder, &wait).await? else {
            return Ok(false);
        };
        if acquisition == Acquisition::Reentered {
            debug!(
                lock_key = %self.lock_key,
                holds = self.local.hold_count(holder),
                "Reentered lock"
            );
            return Ok(true);
        }

        // Any early return below gives the local hold back
        let guard = LocalHoldGuard::new(&self.local, holder);
        let session = Arc::new(LeaseSession::new(self.store.clone(), self.lock_key.as_str()));

        while !session.try_acquire(lease).await {
            let pause = match &wait {
                Wait::Immediate => return Ok(false),
                Wait::Unbounded | Wait::Interruptible(_) => self.settings.retry_backoff,
                Wait::Until(deadline, _) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        debug!(lock_key = %self.lock_key, "Timed out waiting for lease");
                        return Ok(false);
                    }
                    remaining.min(self.settings.retry_backoff)
                }
            };
            self.pause(pause, &wait).await?;
        }

        let renewing = Arc::clone(&session);
        let watchdog = Watchdog::start(self.lock_key.as_str(), interval, move || {
            let session = Arc::clone(&renewing);
            async move { session.try_renew(lease).await }
        });

        debug!(
            lock_key = %self.lock_key,
            version = session.version(),
            lease_ms = lease.as_millis() as u64,
            "Acquired lock"
        );
        *self.held.lock() = Some(HeldLease { session, watchdog });
        guard.disarm();
        Ok(true)
    }

    async fn acquire_local(&self, holder: HolderId, wait: &Wait<'_>) -> Result<Option<Acquisition>> {
        match wait {
            Wait::Immediate => Ok(self.local.try_acquire(holder)),
            Wait::Unbounded => Ok(Some(self.local.acquire(holder).await)),
            Wait::Interruptible(interrupt) => tokio::select! {
                biased;
                acquisition = self.local.acquire(holder) => Ok(Some(acquisition)),
                _ = interrupt.interrupted() => {
                    interrupt.take();
                    Err(LockError::Interrupted)
                }
            },
            Wait::Until(deadline, interrupt) => tokio::select! {
                biased;
                acquisition = self.local.acquire(holder) => Ok(Some(acquisition)),
                _ = interrupt.interrupted() => {
                    interrupt.take();
                    Err(LockError::Interrupted)
                }
                _ = tokio::time::sleep_until(*deadline) => Ok(None),
            },
        }
    }

    async fn pause(&self, duration: Duration, wait: &Wait<'_>) -> Result<()> {
        let Some(interrupt) = wait.interrupt() else {
            tokio::time::sleep(duration).await;
            return Ok(());
        };

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = interrupt.interrupted() => {
                interrupt.take();
                debug!(lock_key = %self.lock_key, "Interrupted while waiting for lease");
                Err(LockError::Interrupted)
            }
        }
    }
}

#[async_trait]
impl DistributedLock for LeaseLock {
    fn lock_key(&self) -> &str {
        &self.lock_key
    }

    fn default_lease(&self) -> Duration {
        self.settings.default_lease
    }

    async fn lock_with_lease(&self, lease: Duration) -> Result<()> {
        self.acquire(lease, Wait::Unbounded).await.map(|_| ())
    }

    async fn lock_interruptibly_with_lease(
        &self,
        lease: Duration,
        interrupt: &Interrupt,
    ) -> Result<()> {
        self.acquire(lease, Wait::Interruptible(interrupt))
            .await
            .map(|_| ())
    }

    async fn try_lock(&self) -> Result<bool> {
        self.acquire(self.settings.default_lease, Wait::Immediate)
            .await
    }

    async fn try_lock_for_with_lease(
        &self,
        wait: Duration,
        lease: Duration,
        interrupt: &Interrupt,
    ) -> Result<bool> {
        let wait = match Instant::now().checked_add(wait) {
            Some(deadline) => Wait::Until(deadline, interrupt),
            None => Wait::Interruptible(interrupt),
        };
        self.acquire(lease, wait).await
    }

    async fn unlock(&self) -> Result<()> {
        let holder = HolderId::current();

        match self.local.hold_count(holder) {
            0 => Err(LockError::NotOwner {
                lock_key: self.lock_key.clone(),
            }),
            1 => {
                // Local release happens last, whatever the store says
                let _release = LocalHoldGuard::new(&self.local, holder);

                let held = self.held.lock().take();
                if let Some(HeldLease { session, watchdog }) = held {
                    watchdog.stop().await;
                    if session.is_lost() {
                        warn!(
                            lock_key = %self.lock_key,
                            version = session.version(),
                            "Unlocking a lease that was lost while held"
                        );
                    }
                    session.try_release().await;
                }
                debug!(lock_key = %self.lock_key, "Released lock");
                Ok(())
            }
            _ => {
                self.local.release(holder);
                Ok(())
            }
        }
    }

    fn new_condition(&self) -> Result<Condition> {
        Err(LockError::UnsupportedOperation("new_condition"))
    }
}

impl Drop for LeaseLock {
    fn drop(&mut self) {
        // Dropping the watchdog stops renewal; the record expires on its own
        if let Some(held) = self.held.get_mut().take() {
            warn!(
                lock_key = %self.lock_key,
                version = held.session.version(),
                "Lock dropped while held, the lease will expire"
            );
        }
    }
}

impl std::fmt::Debug for LeaseLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseLock")
            .field("lock_key", &self.lock_key)
            .field("settings", &self.settings)
            .field("status", &self.lease_status())
            .finish()
    }
}
