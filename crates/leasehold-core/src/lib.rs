//! Leasehold Core - Lease-based distributed locking
//!
//! This crate provides:
//! - Lease sessions: versioned acquire/renew/release against a `LockStore`
//! - The renewal watchdog keeping a held lease alive
//! - `LeaseLock`, a reentrant, interruptible, timeout-capable distributed lock
//! - The lock provider and configuration loading

pub mod config;
pub mod interrupt;
pub mod local;
pub mod lock;
pub mod provider;
pub mod session;
pub mod settings;
pub mod watchdog;

pub use config::Configuration;
pub use interrupt::Interrupt;
pub use local::HolderId;
pub use lock::{Condition, DistributedLock, LeaseLock, LeaseStatus};
pub use provider::LockProvider;
pub use session::LeaseSession;
pub use settings::LockSettings;
pub use watchdog::Watchdog;

pub use leasehold_common::{LockError, Result};
