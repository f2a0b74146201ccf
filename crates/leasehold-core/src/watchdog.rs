//! Renewal watchdog
//!
//! One background task per held lease. It sleeps for the interval, runs the
//! renewal callback, and repeats until stopped or until the callback returns
//! an error. A renewal already in flight when the stop arrives is allowed to
//! complete, so the session's version always matches the store afterwards.

use std::future::Future;
use std::time::Duration;

use leasehold_common::Result;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct Watchdog {
    lock_key: String,
    interval: Duration,
    stop_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    /// Spawn the renewal loop on the current runtime
    ///
    /// The callback returns `Ok(true)` on renewal, `Ok(false)` on a transient
    /// failure worth retrying at the next tick, and `Err` when the lease cannot
    /// be renewed anymore. Dropping the returned `Watchdog` stops the loop.
    pub fn start<F, Fut>(lock_key: impl Into<String>, interval: Duration, mut renew: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<bool>> + Send + 'static,
    {
        let lock_key = lock_key.into();
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let task_key = lock_key.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Fires on stop() and when the sender is dropped
                    _ = &mut stop_rx => break,
                    _ = tokio::time::sleep(interval) => {}
                }

                match renew().await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(lock_key = %task_key, "Renewal attempt failed, retrying next interval");
                    }
                    Err(e) => {
                        warn!(lock_key = %task_key, error = %e, "Stopping lease renewal");
                        break;
                    }
                }
            }
            debug!(lock_key = %task_key, "Watchdog exited");
        });

        debug!(lock_key = %lock_key, interval_ms = interval.as_millis() as u64, "Watchdog started");

        Self {
            lock_key,
            interval,
            stop_tx,
            handle,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the loop has exited on its own or after a stop
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop and wait until it has exited
    ///
    /// A panicked renewal task is logged, never propagated.
    pub async fn stop(self) {
        let Self {
            lock_key,
            stop_tx,
            handle,
            ..
        } = self;

        // Err means the loop already exited
        let _ = stop_tx.send(());

        if let Err(e) = handle.await {
            warn!(lock_key = %lock_key, error = %e, "Watchdog task ended abnormally");
        }
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("lock_key", &self.lock_key)
            .field("interval", &self.interval)
            .field("finished", &self.is_finished())
            .finish()
    }
}
