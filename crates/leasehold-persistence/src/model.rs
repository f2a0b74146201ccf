//! Domain model types for the lock store
//!
//! These types are returned from the `LockStore` trait, decoupled from the
//! storage backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::distributed_lock;

/// Persisted lease for one lock key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    pub lock_key: String,
    /// Optimistic-concurrency token, starts at 1
    pub version: i64,
    /// Epoch milliseconds after which the lease may be taken over
    pub expired_time: i64,
}

impl LockRecord {
    pub fn new(lock_key: impl Into<String>, version: i64, expired_time: i64) -> Self {
        Self {
            lock_key: lock_key.into(),
            version,
            expired_time,
        }
    }

    /// A lease is live strictly before its expiry instant.
    pub fn is_live(&self, now: i64) -> bool {
        now < self.expired_time
    }

    /// Expiry as a UTC timestamp, for display
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expired_time)
    }
}

impl From<distributed_lock::Model> for LockRecord {
    fn from(model: distributed_lock::Model) -> Self {
        Self {
            lock_key: model.lock_key,
            version: model.version,
            expired_time: model.expired_time,
        }
    }
}

/// Backend selected for the lock table
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// MySQL, PostgreSQL, or SQLite through SeaORM
    ExternalDb,
    /// Process-local map
    Memory,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::ExternalDb => write!(f, "external_db"),
            StorageMode::Memory => write!(f, "memory"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness_boundary() {
        let record = LockRecord::new("job-42", 1, 10_000);
        assert!(record.is_live(9_999));
        // expiry instant itself counts as abandoned
        assert!(!record.is_live(10_000));
        assert!(!record.is_live(10_001));
    }

    #[test]
    fn test_expires_at() {
        let record = LockRecord::new("job-42", 1, 0);
        assert_eq!(record.expires_at().unwrap().timestamp(), 0);
    }

    #[test]
    fn test_from_entity_model() {
        let model = distributed_lock::Model {
            lock_key: "job-42".to_string(),
            version: 7,
            expired_time: 1234,
        };
        let record: LockRecord = model.into();
        assert_eq!(record, LockRecord::new("job-42", 7, 1234));
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(LockRecord::new("a", 2, 3)).unwrap();
        assert_eq!(json["lockKey"], "a");
        assert_eq!(json["version"], 2);
        assert_eq!(json["expiredTime"], 3);
    }
}
