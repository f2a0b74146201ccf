//! Lock protocol over SQL storage
//!
//! Two connection pools on one SQLite file stand in for two processes that
//! share a database.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{KEY, sqlite_store};
use leasehold_common::current_timestamp;
use leasehold_core::{DistributedLock, Interrupt, LockProvider, LockSettings};
use leasehold_persistence::LockStore;

fn provider(store: leasehold_persistence::SqlLockStore, lease: Duration) -> LockProvider {
    LockProvider::new(
        Arc::new(store),
        LockSettings::new(lease, Duration::from_millis(20)),
    )
}

#[tokio::test]
async fn test_exclusion_across_pools() {
    let dir = tempfile::tempdir().unwrap();
    let first = provider(sqlite_store(&dir).await, Duration::from_secs(10));
    let second = provider(sqlite_store(&dir).await, Duration::from_secs(10));

    let a = first.get_lock(KEY);
    let b = second.get_lock(KEY);

    assert!(a.try_lock().await.unwrap());
    assert!(!b.try_lock().await.unwrap());

    let record = second.store().find(KEY).await.unwrap().unwrap();
    assert_eq!(record.version, 1);
    assert!(record.is_live(current_timestamp()));

    a.unlock().await.unwrap();
    assert!(second.store().find(KEY).await.unwrap().is_none());

    assert!(b.try_lock().await.unwrap());
    assert_eq!(b.held_version(), Some(1));
    b.unlock().await.unwrap();
}

#[tokio::test]
async fn test_takeover_across_pools() {
    let dir = tempfile::tempdir().unwrap();
    let first = provider(sqlite_store(&dir).await, Duration::from_millis(200));
    let second = provider(sqlite_store(&dir).await, Duration::from_millis(200));

    let crashed = first.get_lock(KEY);
    crashed.lock().await.unwrap();
    drop(crashed);

    let successor = second.get_lock(KEY);
    let acquired = successor
        .try_lock_for(Duration::from_secs(3), &Interrupt::new())
        .await
        .unwrap();
    assert!(acquired);
    assert_eq!(successor.held_version(), Some(2));

    successor.unlock().await.unwrap();
    assert!(first.store().find(KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_renewal_through_sql_store() {
    let dir = tempfile::tempdir().unwrap();
    let first = provider(sqlite_store(&dir).await, Duration::from_millis(300));
    let second = provider(sqlite_store(&dir).await, Duration::from_millis(300));

    let holder = first.get_lock(KEY);
    holder.lock().await.unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;

    let record = second.store().find(KEY).await.unwrap().unwrap();
    assert!(record.version > 1);
    assert!(!second.get_lock(KEY).try_lock().await.unwrap());

    holder.unlock().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_race_between_pools() {
    let dir = tempfile::tempdir().unwrap();
    let providers = [
        provider(sqlite_store(&dir).await, Duration::from_secs(2)),
        provider(sqlite_store(&dir).await, Duration::from_secs(2)),
    ];
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let lock = providers[i % 2].get_lock(KEY);
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            tokio::spawn(async move {
                let acquired = lock
                    .try_lock_for(Duration::from_secs(10), &Interrupt::new())
                    .await
                    .unwrap();
                if acquired {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                    lock.unlock().await.unwrap();
                }
                acquired
            })
        })
        .collect();

    for worker in workers {
        assert!(worker.await.unwrap());
    }
    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
}
