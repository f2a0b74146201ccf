//! Leasehold Persistence - Lock record storage
//!
//! This crate provides:
//! - The SeaORM entity for the `distributed_lock` table
//! - The `LockStore` trait: the four atomic operations the lock protocol needs
//! - A SQL backend (MySQL/PostgreSQL/SQLite via SeaORM)
//! - An in-memory backend for single-process use and protocol tests

pub mod entity;
pub mod memory;
pub mod model;
pub mod settings;
pub mod sql;
pub mod traits;

// Re-export sea-orm for convenience
pub use sea_orm;

// Re-export store trait and backends
pub use memory::MemoryLockStore;
pub use sql::{SqlLockStore, ensure_schema};
pub use traits::LockStore;

// Re-export model and settings types
pub use model::{LockRecord, StorageMode};
pub use settings::DatabaseSettings;
