use engine_core::{error::StateError, state::CheckpointStore};
use model::{
    execution::identity::JobIdentity,
    pagination::cursor::{KeyKind, OrderingKey},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened to a checkpoint handed to [`CheckpointManager::commit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed,
    /// Below the last committed key, not written.
    Ignored,
    /// The store rejected the write.
    Failed,
}

/// Tracks the last committed ordering key of one job identity.
///
/// Checkpoints are advisory: a failed write is logged and reported, never
/// raised. Commits only move forward; a key below the last one this manager
/// committed is ignored.
pub struct CheckpointManager {
    identity: JobIdentity,
    kind: KeyKind,
    store: Arc<dyn CheckpointStore>,
    committed: Option<OrderingKey>,
}

impl CheckpointManager {
    pub fn new(identity: JobIdentity, kind: KeyKind, store: Arc<dyn CheckpointStore>) -> Self {
        Self {
            identity,
            kind,
            store,
            committed: None,
        }
    }

    pub fn identity(&self) -> &JobIdentity {
        &self.identity
    }

    /// Last key this manager knows to be committed.
    pub fn committed(&self) -> Option<OrderingKey> {
        self.committed
    }

    /// Reads the stored checkpoint.
    ///
    /// A value that does not parse as this job's key kind means the key
    /// belongs to a different job layout, which is fatal.
    pub async fn last_key(&mut self) -> Result<Option<OrderingKey>, StateError> {
        let key = self.identity.checkpoint_key();
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        let parsed = self.kind.parse(&raw).map_err(|e| StateError::Corrupt {
            key: key.clone(),
            value: raw.clone(),
            reason: e.to_string(),
        })?;

        self.committed = self.committed.max(Some(parsed));
        Ok(Some(parsed))
    }

    /// First key a run asked to start at `requested` must read.
    pub async fn resume_from(&mut self, requested: OrderingKey) -> Result<OrderingKey, StateError> {
        match self.last_key().await? {
            Some(checkpoint) => {
                let start = requested.max(checkpoint.successor());
                info!(
                    job = %self.identity,
                    checkpoint = %checkpoint,
                    requested = %requested,
                    start = %start,
                    "Resuming from checkpoint"
                );
                Ok(start)
            }
            None => {
                info!(
                    job = %self.identity,
                    start = %requested,
                    "No checkpoint found, starting fresh"
                );
                Ok(requested)
            }
        }
    }

    /// Records `key` as processed.
    pub async fn commit(&mut self, key: OrderingKey) -> CommitOutcome {
        if let Some(last) = self.committed {
            if key < last {
                debug!(
                    job = %self.identity,
                    key = %key,
                    committed = %last,
                    "Ignoring checkpoint below the committed key"
                );
                return CommitOutcome::Ignored;
            }
        }

        let value = key.to_string();
        match self
            .store
            .set(&self.identity.checkpoint_key(), &value)
            .await
        {
            Ok(()) => {
                self.committed = Some(key);
                debug!(job = %self.identity, key = %value, "Checkpoint committed");
                CommitOutcome::Committed
            }
            Err(err) => {
                warn!(
                    job = %self.identity,
                    key = %value,
                    error = %err,
                    "Failed to write checkpoint, continuing"
                );
                CommitOutcome::Failed
            }
        }
    }
}
