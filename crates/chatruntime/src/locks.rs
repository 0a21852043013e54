use chatcore::ContactId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-contact async mutex serialising the inbound path and the worker path
#[derive(Clone, Default)]
pub struct ContactLocks {
    inner: Arc<DashMap<ContactId, Arc<Mutex<()>>>>,
}

impl ContactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `contact_id`; released when the guard drops
    pub async fn lock(&self, contact_id: ContactId) -> OwnedMutexGuard<()> {
        let mutex = self.inner.entry(contact_id).or_default().clone();
        mutex.lock_owned().await
    }

    /// Forget mutexes nobody holds or waits on
    pub fn prune(&self) {
        self.inner.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
