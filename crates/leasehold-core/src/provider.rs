//! Lock provider

use std::sync::Arc;

use leasehold_persistence::LockStore;

use crate::lock::LeaseLock;
use crate::settings::LockSettings;

/// Hands out `LeaseLock`s that share one store and one set of timings
///
/// Every call returns a new lock instance; instances for the same key exclude
/// each other through the store only.
#[derive(Clone)]
pub struct LockProvider {
    store: Arc<dyn LockStore>,
    settings: LockSettings,
}

impl LockProvider {
    pub fn new(store: Arc<dyn LockStore>, settings: LockSettings) -> Self {
        Self { store, settings }
    }

    pub fn get_lock(&self, lock_key: impl Into<String>) -> LeaseLock {
        LeaseLock::new(self.store.clone(), lock_key, self.settings)
    }

    pub fn store(&self) -> &Arc<dyn LockStore> {
        &self.store
    }

    pub fn settings(&self) -> &LockSettings {
        &self.settings
    }
}

impl std::fmt::Debug for LockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockProvider")
            .field("storage_mode", &self.store.storage_mode())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use leasehold_persistence::{MemoryLockStore, StorageMode};

    use super::*;
    use crate::lock::DistributedLock;

    #[tokio::test]
    async fn test_locks_share_store_and_settings() {
        let settings = LockSettings::new(Duration::from_secs(10), Duration::from_millis(10));
        let provider = LockProvider::new(Arc::new(MemoryLockStore::new()), settings);
        assert_eq!(provider.store().storage_mode(), StorageMode::Memory);

        let first = provider.get_lock("job-42");
        let second = provider.get_lock("job-42");
        assert_eq!(first.lock_key(), "job-42");
        assert_eq!(second.default_lease(), Duration::from_secs(10));

        assert!(first.try_lock().await.unwrap());
        // A separate instance is excluded by the store, not by the local lock
        assert!(!second.is_locked());
        assert!(!second.try_lock().await.unwrap());

        first.unlock().await.unwrap();
        assert!(second.try_lock().await.unwrap());
        second.unlock().await.unwrap();
    }
}
