use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per subscription id, held across a whole charge attempt and across
/// every lifecycle write, so no two of them touch the same subscription at once.
#[derive(Clone, Default)]
pub struct ChargeLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

impl ChargeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, subscription_id: i64) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(subscription_id).or_default().value().clone();
        lock.lock_owned().await
    }
}
