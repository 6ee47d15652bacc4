use crate::error::StateError;
use async_trait::async_trait;

pub mod memory;
pub mod models;
pub mod sled_store;

/// Key-value store holding one checkpoint value per job identity.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StateError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StateError>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, StateError>;
}
