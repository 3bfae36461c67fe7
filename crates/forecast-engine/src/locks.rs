use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One in-flight recalculation per model.
///
/// Projected-row replacement is delete-then-insert against shared tables, so
/// two concurrent runs over the same model would interleave. The engine
/// acquires the model's lock for the whole call; different models proceed in
/// parallel.
#[derive(Default)]
pub struct ModelLocks {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl ModelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a model. The guard releases on drop.
    pub async fn acquire(&self, model_id: i64) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(model_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
