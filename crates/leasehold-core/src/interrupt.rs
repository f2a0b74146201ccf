//! Interruption signal for blocking lock acquisition
//!
//! An `Interrupt` is a level-triggered flag shared between the caller waiting
//! for a lock and whoever wants to abort that wait. Interruptible operations
//! consume the flag when they report `LockError::Interrupted`, so a handle can
//! be reused for the next wait.

use std::sync::Arc;

use tokio::sync::watch;

/// Clonable interruption flag
#[derive(Clone, Debug)]
pub struct Interrupt {
    sender: Arc<watch::Sender<bool>>,
}

impl Interrupt {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Raise the flag, waking every interruptible wait observing it
    pub fn interrupt(&self) {
        self.sender.send_replace(true);
    }

    /// Check the flag without consuming it
    pub fn is_interrupted(&self) -> bool {
        *self.sender.borrow()
    }

    /// Clear the flag, returning whether it was raised
    pub fn take(&self) -> bool {
        if !self.is_interrupted() {
            return false;
        }
        self.sender.send_replace(false)
    }

    /// Resolve once the flag is raised
    pub async fn interrupted(&self) {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so the channel cannot close while waiting
        let _ = receiver.wait_for(|raised| *raised).await;
    }
}

impl Default for Interrupt {
    fn default() -> Self {
        Self::new()
    }
}
