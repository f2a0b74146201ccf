//! Lock store trait
//!
//! The lock protocol depends only on these four operations being atomic and
//! individually consistent for a single lock key. No multi-key transactions
//! are required, so any store offering conditional insert/update/delete fits.

use async_trait::async_trait;

use crate::model::{LockRecord, StorageMode};

/// Atomic operations against the lock table, keyed by lock key
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Read the current record for `lock_key`
    async fn find(&self, lock_key: &str) -> anyhow::Result<Option<LockRecord>>;

    /// Insert `{version: 1, expired_time}` unless a record for `lock_key` exists
    ///
    /// Returns `false` when the key already exists.
    async fn insert_if_absent(&self, lock_key: &str, expired_time: i64) -> anyhow::Result<bool>;

    /// Set `version = version + 1, expired_time` where the stored version equals
    /// `expected_version`
    ///
    /// Returns the number of affected records (0 or 1).
    async fn update_if_version(
        &self,
        lock_key: &str,
        expected_version: i64,
        expired_time: i64,
    ) -> anyhow::Result<u64>;

    /// Delete the record where the stored version equals `expected_version`
    ///
    /// Returns the number of affected records (0 or 1).
    async fn delete_if_version(&self, lock_key: &str, expected_version: i64)
    -> anyhow::Result<u64>;

    /// Delete the record regardless of version (operator recovery)
    async fn force_delete(&self, lock_key: &str) -> anyhow::Result<bool>;

    /// Get the backend kind
    fn storage_mode(&self) -> StorageMode;

    /// Health check for the storage backend
    async fn health_check(&self) -> anyhow::Result<()>;
}
