use engine_core::connectors::store::DocumentStore;
use model::execution::quarantine::QuarantineRecord;
use std::{sync::Arc, time::Duration};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, warn};

/// How long finished jobs wait for outstanding quarantine writes.
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(5);

/// Best-effort side channel for failed writes.
///
/// Records are written on background tasks the batch loop never awaits.
/// A failed quarantine write is logged and dropped.
#[derive(Clone)]
pub struct QuarantineWriter {
    store: Arc<dyn DocumentStore>,
    index: String,
    tracker: TaskTracker,
}

impl QuarantineWriter {
    pub fn new(store: Arc<dyn DocumentStore>, index: impl Into<String>) -> Self {
        Self {
            store,
            index: index.into(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn submit(&self, record: QuarantineRecord) {
        let store = self.store.clone();
        let index = self.index.clone();

        let write = async move {
            match store.write_one(&index, &record.to_document()).await {
                Ok(()) => debug!(
                    record_id = %record.id,
                    kind = %record.kind,
                    docs = record.document_ids.len(),
                    "Quarantine record written"
                ),
                Err(err) => warn!(
                    record_id = %record.id,
                    job = %record.job,
                    kind = %record.kind,
                    document_ids = ?record.document_ids,
                    error = %err,
                    "Failed to write quarantine record"
                ),
            }
        };
        self.tracker.spawn(write.in_current_span());
    }

    /// Writes still in flight.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits at most `grace` for in-flight writes. Returns `true` when all
    /// of them finished; the rest may be lost.
    pub async fn drain(&self, grace: Duration) -> bool {
        self.tracker.close();
        let drained = tokio::time::timeout(grace, self.tracker.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                pending = self.tracker.len(),
                index = %self.index,
                "Quarantine writes still pending after grace period"
            );
        }
        drained
    }
}
