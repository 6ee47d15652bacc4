use crate::{error::StateError, state::CheckpointStore};
use async_trait::async_trait;
use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
};
use tokio::sync::RwLock;

/// Process-local checkpoint store.
///
/// Keeps every write in `history` and can be told to fail the next `n`
/// writes, which makes checkpoint behaviour observable in tests.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    entries: RwLock<BTreeMap<String, String>>,
    history: RwLock<Vec<(String, String)>>,
    failing_sets: AtomicUsize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_sets(&self, n: usize) {
        self.failing_sets.store(n, Ordering::SeqCst);
    }

    /// Every successful `set`, in call order.
    pub async fn history(&self) -> Vec<(String, String)> {
        self.history.read().await.clone()
    }

    fn take_failure(&self) -> bool {
        self.failing_sets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError> {
        if self.take_failure() {
            return Err(StateError::Backend("injected set failure".to_string()));
        }
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        self.history
            .write()
            .await
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StateError> {
        Ok(self
            .entries
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
