//! In-process reentrant exclusion
//!
//! Serializes acquisitions of one `LeaseLock` inside the process and tracks
//! reentrant holds. Ownership is keyed on the calling execution context: the
//! tokio task when running inside one, the OS thread otherwise. Futures joined
//! or selected within one task therefore share an identity.

use std::thread::ThreadId;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task;

/// Identity of the execution context that owns a local hold
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HolderId {
    Task(task::Id),
    Thread(ThreadId),
}

impl HolderId {
    pub fn current() -> Self {
        match task::try_id() {
            Some(id) => HolderId::Task(id),
            None => HolderId::Thread(std::thread::current().id()),
        }
    }
}

/// Outcome of a successful local acquisition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// First hold; the caller must go on to acquire the remote lease
    Outermost,
    /// The holder already owned the lock; hold count incremented
    Reentered,
}

#[derive(Debug, Default)]
struct State {
    owner: Option<HolderId>,
    holds: usize,
}

/// Reentrant mutual exclusion between holders of one process
#[derive(Debug, Default)]
pub struct ReentrantLocalLock {
    state: Mutex<State>,
    released: Notify,
}

impl ReentrantLocalLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, holder: HolderId) -> Option<Acquisition> {
        let mut state = self.state.lock();
        match state.owner {
            None => {
                state.owner = Some(holder);
                state.holds = 1;
                Some(Acquisition::Outermost)
            }
            Some(owner) if owner == holder => {
                state.holds += 1;
                Some(Acquisition::Reentered)
            }
            Some(_) => None,
        }
    }

    /// Wait until the lock is free or already owned by `holder`
    ///
    /// Cancel safe: a dropped future never holds the lock.
    pub async fn acquire(&self, holder: HolderId) -> Acquisition {
        loop {
            let notified = self.released.notified();
            tokio::pin!(notified);
            // Register before checking so a release in between is not missed
            notified.as_mut().enable();

            if let Some(acquisition) = self.try_acquire(holder) {
                return acquisition;
            }
            notified.await;
        }
    }

    /// Drop one hold of `holder`
    ///
    /// Returns the remaining hold count, or `None` when `holder` is not the
    /// owner.
    pub fn release(&self, holder: HolderId) -> Option<usize> {
        let remaining = {
            let mut state = self.state.lock();
            if state.owner != Some(holder) {
                return None;
            }
            state.holds -= 1;
            if state.holds == 0 {
                state.owner = None;
            }
            state.holds
        };

        if remaining == 0 {
            self.released.notify_waiters();
        }
        Some(remaining)
    }

    /// Number of holds owned by `holder`
    pub fn hold_count(&self, holder: HolderId) -> usize {
        let state = self.state.lock();
        if state.owner == Some(holder) {
            state.holds
        } else {
            0
        }
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }
}

/// Releases one local hold when dropped unless disarmed
pub(crate) struct LocalHoldGuard<'a> {
    local: &'a ReentrantLocalLock,
    holder: HolderId,
    armed: bool,
}

impl<'a> LocalHoldGuard<'a> {
    pub(crate) fn new(local: &'a ReentrantLocalLock, holder: HolderId) -> Self {
        Self {
            local,
            holder,
            armed: true,
        }
    }

    pub(crate) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LocalHoldGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.local.release(self.holder);
        }
    }
}
