//! Operator commands

use std::time::{Duration, Instant};

use leasehold_common::{LockError, current_timestamp};
use leasehold_core::{DistributedLock, Interrupt, LockProvider};
use leasehold_persistence::{LockRecord, LockStore, SqlLockStore, ensure_schema};
use serde::Serialize;
use tracing::{info, warn};

/// Printable view of a lock record
#[derive(Debug, Serialize)]
pub struct RecordView {
    pub lock_key: String,
    pub version: i64,
    pub expired_time: i64,
    pub expires_at: Option<String>,
    pub live: bool,
}

impl RecordView {
    pub fn new(record: &LockRecord, now: i64) -> Self {
        Self {
            lock_key: record.lock_key.clone(),
            version: record.version,
            expired_time: record.expired_time,
            expires_at: record.expires_at().map(|t| t.to_rfc3339()),
            live: record.is_live(now),
        }
    }
}

/// Outcome counts of a race
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct RaceReport {
    pub workers: usize,
    pub acquired: usize,
    pub timed_out: usize,
    pub failed: usize,
}

pub async fn init_schema(store: &SqlLockStore) -> anyhow::Result<()> {
    ensure_schema(store.db()).await?;
    info!("Lock table is ready");
    Ok(())
}

pub async fn inspect(
    store: &dyn LockStore,
    lock_key: &str,
) -> leasehold_common::Result<Option<RecordView>> {
    let record = store.find(lock_key).await?;
    Ok(record.map(|r| RecordView::new(&r, current_timestamp())))
}

/// Delete a record whatever its version, for stuck holders
pub async fn release(store: &dyn LockStore, lock_key: &str) -> leasehold_common::Result<bool> {
    let deleted = store.force_delete(lock_key).await?;
    if deleted {
        warn!(lock_key = %lock_key, "Lock record force deleted");
    } else {
        info!(lock_key = %lock_key, "No lock record to delete");
    }
    Ok(deleted)
}

/// Acquire, keep the lease renewed for `hold`, and release
///
/// Ctrl+C ends the hold early and still releases the lease.
pub async fn hold(
    provider: &LockProvider,
    lock_key: &str,
    lease: Duration,
    hold: Duration,
) -> anyhow::Result<()> {
    let lock = provider.get_lock(lock_key);
    let interrupt = Interrupt::new();

    let waiting = {
        let interrupt = interrupt.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.interrupt();
            }
        })
    };

    let started = Instant::now();
    lock.lock_interruptibly_with_lease(lease, &interrupt).await?;
    info!(
        lock_key = %lock_key,
        version = lock.held_version(),
        waited_ms = started.elapsed().as_millis() as u64,
        "Lock acquired"
    );

    tokio::select! {
        _ = tokio::time::sleep(hold) => {}
        _ = interrupt.interrupted() => {
            info!(lock_key = %lock_key, "Hold interrupted");
        }
    }
    waiting.abort();

    let status = lock.lease_status();
    lock.unlock().await?;
    info!(lock_key = %lock_key, status = ?status, "Lock released");
    Ok(())
}

/// Run `workers` concurrent acquirers, each with its own lock instance
pub async fn race(
    provider: &LockProvider,
    lock_key: &str,
    workers: usize,
    wait: Duration,
    lease: Duration,
    hold: Duration,
) -> anyhow::Result<RaceReport> {
    let interrupt = Interrupt::new();
    let mut handles = Vec::with_capacity(workers);

    for worker in 0..workers {
        let lock = provider.get_lock(lock_key);
        let interrupt = interrupt.clone();
        handles.push(tokio::spawn(async move {
            let acquired = lock
                .try_lock_for_with_lease(wait, lease, &interrupt)
                .await?;
            if acquired {
                info!(worker, version = lock.held_version(), "Worker acquired lock");
                tokio::time::sleep(hold).await;
                lock.unlock().await?;
            } else {
                info!(worker, "Worker timed out");
            }
            Ok::<bool, LockError>(acquired)
        }));
    }

    let mut report = RaceReport {
        workers,
        ..Default::default()
    };
    for handle in handles {
        match handle.await? {
            Ok(true) => report.acquired += 1,
            Ok(false) => report.timed_out += 1,
            Err(e) => {
                warn!(error = %e, "Worker failed");
                report.failed += 1;
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use leasehold_core::LockSettings;
    use leasehold_persistence::MemoryLockStore;

    use super::*;

    #[test]
    fn test_record_view() {
        let record = LockRecord::new("job-42", 3, 10_000);

        let view = RecordView::new(&record, 9_000);
        assert!(view.live);
        assert_eq!(view.expires_at.as_deref(), Some("1970-01-01T00:00:10+00:00"));

        let json = serde_json::to_value(RecordView::new(&record, 10_000)).unwrap();
        assert_eq!(json["lock_key"], "job-42");
        assert_eq!(json["version"], 3);
        assert_eq!(json["live"], false);
    }

    #[tokio::test]
    async fn test_inspect_and_release() {
        let store = MemoryLockStore::new();
        store.put(LockRecord::new("job-42", 2, i64::MAX));

        let view = inspect(&store, "job-42").await.unwrap().unwrap();
        assert_eq!(view.version, 2);
        assert!(view.live);

        assert!(release(&store, "job-42").await.unwrap());
        assert!(inspect(&store, "job-42").await.unwrap().is_none());
        assert!(!release(&store, "job-42").await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failures_surface_as_store_errors() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("lock.db").display());
        let store = SqlLockStore::connect(&leasehold_persistence::DatabaseSettings::new(url))
            .await
            .unwrap();

        // No schema yet
        let err = inspect(&store, "job-42").await.unwrap_err();
        assert!(matches!(err, LockError::Store(_)));

        init_schema(&store).await.unwrap();
        assert!(inspect(&store, "job-42").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_race_everyone_gets_a_turn() {
        let provider = LockProvider::new(
            Arc::new(MemoryLockStore::new()),
            LockSettings::new(Duration::from_secs(1), Duration::from_millis(5)),
        );

        let report = race(
            &provider,
            "job-42",
            4,
            Duration::from_secs(5),
            Duration::from_secs(1),
            Duration::from_millis(10),
        )
        .await
        .unwrap();

        assert_eq!(
            report,
            RaceReport {
                workers: 4,
                acquired: 4,
                timed_out: 0,
                failed: 0,
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_race_with_short_wait_times_out() {
        let store = MemoryLockStore::new();
        store.put(LockRecord::new("job-42", 1, i64::MAX));
        let provider = LockProvider::new(
            Arc::new(store),
            LockSettings::new(Duration::from_secs(1), Duration::from_millis(5)),
        );

        let report = race(
            &provider,
            "job-42",
            3,
            Duration::from_millis(50),
            Duration::from_secs(1),
            Duration::ZERO,
        )
        .await
        .unwrap();

        assert_eq!(report.acquired, 0);
        assert_eq!(report.timed_out, 3);
    }

    #[tokio::test]
    async fn test_hold_releases_the_lease() {
        let store = MemoryLockStore::new();
        let provider = LockProvider::new(
            Arc::new(store.clone()),
            LockSettings::new(Duration::from_secs(1), Duration::from_millis(5)),
        );

        hold(
            &provider,
            "job-42",
            Duration::from_millis(90),
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        assert!(store.is_empty());
    }
}
