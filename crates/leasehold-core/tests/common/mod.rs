//! Shared fixtures for lock integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use leasehold_core::{LockProvider, LockSettings};
use leasehold_persistence::{
    DatabaseSettings, LockRecord, LockStore, MemoryLockStore, SqlLockStore, StorageMode,
    ensure_schema,
};

pub const KEY: &str = "job-42";

pub fn memory_provider(store: &MemoryLockStore, lease: Duration, backoff: Duration) -> LockProvider {
    LockProvider::new(Arc::new(store.clone()), LockSettings::new(lease, backoff))
}

/// Open an independent pool on a SQLite file, as a separate process would
pub async fn sqlite_store(dir: &tempfile::TempDir) -> SqlLockStore {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("lock.db").display());
    let settings = DatabaseSettings::new(url).with_pool_size(1, 1);
    let store = SqlLockStore::connect(&settings).await.unwrap();
    ensure_schema(store.db()).await.unwrap();
    store
}

/// Memory store whose conditional deletes can be made to fail
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryLockStore,
    pub fail_deletes: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl LockStore for FlakyStore {
    async fn find(&self, lock_key: &str) -> anyhow::Result<Option<LockRecord>> {
        self.inner.find(lock_key).await
    }

    async fn insert_if_absent(&self, lock_key: &str, expired_time: i64) -> anyhow::Result<bool> {
        self.inner.insert_if_absent(lock_key, expired_time).await
    }

    async fn update_if_version(
        &self,
        lock_key: &str,
        expected_version: i64,
        expired_time: i64,
    ) -> anyhow::Result<u64> {
        self.inner
            .update_if_version(lock_key, expected_version, expired_time)
            .await
    }

    async fn delete_if_version(
        &self,
        lock_key: &str,
        expected_version: i64,
    ) -> anyhow::Result<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            anyhow::bail!("connection reset by peer");
        }
        self.inner.delete_if_version(lock_key, expected_version).await
    }

    async fn force_delete(&self, lock_key: &str) -> anyhow::Result<bool> {
        self.inner.force_delete(lock_key).await
    }

    fn storage_mode(&self) -> StorageMode {
        self.inner.storage_mode()
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.inner.health_check().await
    }
}
