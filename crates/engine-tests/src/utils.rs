use crate::{QUARANTINE_INDEX, RIDES_JOB};
use connectors::memory::MemoryStore;
use engine_core::state::CheckpointStore;
use engine_runtime::{
    error::ReindexError,
    execution::{JobReport, ReindexJob},
};
use model::{
    execution::{identity::JobIdentity, job::JobConfig},
    pagination::cursor::{KeyRange, OrderingKey},
};
use serde_json::Value;
use std::{sync::Arc, time::Duration};

pub fn rides_config() -> JobConfig {
    JobConfig::from_json(RIDES_JOB).expect("valid rides job")
}

pub fn int_range(start: i64, end: i64) -> KeyRange {
    KeyRange::new(OrderingKey::Integer(start), OrderingKey::Integer(end))
}

/// Build and run one job instance, panicking on configuration errors.
pub async fn run_job(
    config: &JobConfig,
    range: KeyRange,
    partition: Option<&str>,
    store: Arc<MemoryStore>,
    checkpoints: Arc<dyn CheckpointStore>,
) -> Result<JobReport, ReindexError> {
    ReindexJob::new(
        config.clone(),
        range,
        partition.map(str::to_string),
        store,
        checkpoints,
    )
    .expect("job builds")
    .with_drain_grace(Duration::from_secs(2))
    .run()
    .await
}

pub async fn stored_checkpoint(
    checkpoints: &dyn CheckpointStore,
    identity: &JobIdentity,
) -> Option<String> {
    checkpoints
        .get(&identity.checkpoint_key())
        .await
        .expect("checkpoint read")
}

pub async fn quarantine_records(store: &MemoryStore) -> Vec<Value> {
    store
        .written(QUARANTINE_INDEX)
        .await
        .into_values()
        .map(Value::Object)
        .collect()
}

/// Start of the key range of every search opened so far.
pub async fn search_starts(store: &MemoryStore) -> Vec<OrderingKey> {
    store
        .searches()
        .await
        .into_iter()
        .map(|search| search.range.start)
        .collect()
}
