//! In-memory lock store backed by DashMap
//!
//! Each operation runs under the shard lock of its key, which makes the
//! conditional writes atomic per key. Useful for single-process deployments
//! and as a fake store when testing the lock protocol.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::model::{LockRecord, StorageMode};
use crate::traits::LockStore;

/// Process-local lock store
#[derive(Clone, Default)]
pub struct MemoryLockStore {
    records: Arc<DashMap<String, LockRecord>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Overwrite a record unconditionally, bypassing the protocol.
    ///
    /// Simulates manual tampering or a holder in another process.
    pub fn put(&self, record: LockRecord) {
        self.records.insert(record.lock_key.clone(), record);
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn find(&self, lock_key: &str) -> anyhow::Result<Option<LockRecord>> {
        Ok(self.records.get(lock_key).map(|r| r.value().clone()))
    }

    async fn insert_if_absent(&self, lock_key: &str, expired_time: i64) -> anyhow::Result<bool> {
        match self.records.entry(lock_key.to_string()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(entry) => {
                entry.insert(LockRecord::new(lock_key, 1, expired_time));
                Ok(true)
            }
        }
    }

    async fn update_if_version(
        &self,
        lock_key: &str,
        expected_version: i64,
        expired_time: i64,
    ) -> anyhow::Result<u64> {
        match self.records.get_mut(lock_key) {
            Some(mut record) if record.version == expected_version => {
                record.version += 1;
                record.expired_time = expired_time;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn delete_if_version(
        &self,
        lock_key: &str,
        expected_version: i64,
    ) -> anyhow::Result<u64> {
        let removed = self
            .records
            .remove_if(lock_key, |_, record| record.version == expected_version);
        Ok(u64::from(removed.is_some()))
    }

    async fn force_delete(&self, lock_key: &str) -> anyhow::Result<bool> {
        Ok(self.records.remove(lock_key).is_some())
    }

    fn storage_mode(&self) -> StorageMode {
        StorageMode::Memory
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
