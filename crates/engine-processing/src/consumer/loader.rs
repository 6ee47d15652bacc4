use crate::consumer::quarantine::QuarantineWriter;
use engine_core::connectors::store::{BulkOperation, BulkResponse, DocumentStore};
use model::{
    execution::{identity::JobIdentity, quarantine::QuarantineRecord},
    records::batch::Batch,
};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{info, warn};

/// Outcome of writing one batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadResult {
    pub succeeded: usize,
    /// Document id and reason for every document that did not land.
    pub failed: Vec<(String, String)>,
    /// Set when the batch failed as a unit.
    pub whole_batch: Option<String>,
    pub duration: Duration,
}

impl LoadResult {
    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}

/// Writes batches with one bulk request each and quarantines what fails.
///
/// Nothing is retried. A bulk request that fails as a whole becomes one
/// quarantine record for the batch; failed items of an accepted request
/// become one record each.
pub struct BulkLoader {
    store: Arc<dyn DocumentStore>,
    identity: JobIdentity,
    target: String,
    timeout: String,
    quarantine: QuarantineWriter,
}

impl BulkLoader {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        identity: JobIdentity,
        timeout: impl Into<String>,
        quarantine: QuarantineWriter,
    ) -> Self {
        let target = identity.target.clone();
        Self {
            store,
            identity,
            target,
            timeout: timeout.into(),
            quarantine,
        }
    }

    pub async fn load(&self, batch: &Batch) -> LoadResult {
        if batch.is_empty() {
            return LoadResult::default();
        }

        let start = Instant::now();
        let ops: Vec<BulkOperation> = batch
            .docs
            .iter()
            .map(|doc| BulkOperation {
                index: self.target.clone(),
                id: doc.id.clone(),
                document: doc.fields.clone(),
            })
            .collect();

        let mut result = match self.store.bulk_write(&ops, &self.timeout).await {
            Err(err) => self.fail_batch(batch, format!("bulk request failed: {err}")),
            Ok(response) => self.classify(batch, response),
        };
        result.duration = start.elapsed();

        let secs = result.duration.as_secs_f64().max(f64::EPSILON);
        let docs_per_sec = result.succeeded as f64 / secs;
        info!(
            job = %self.identity,
            batch_no = batch.seq,
            docs = batch.len(),
            succeeded = result.succeeded,
            failed = result.failed_count(),
            duration_ms = result.duration.as_millis(),
            docs_per_sec = %format!("{:.2}", docs_per_sec),
            "Batch loaded"
        );
        result
    }

    fn classify(&self, batch: &Batch, response: BulkResponse) -> LoadResult {
        if response.items.len() != batch.len() {
            let reason = if response.errors {
                "store reported errors without per-item detail".to_string()
            } else {
                format!(
                    "store acknowledged {} of {} operations",
                    response.items.len(),
                    batch.len()
                )
            };
            return self.fail_batch(batch, reason);
        }

        let mut result = LoadResult::default();
        for (doc, item) in batch.docs.iter().zip(&response.items) {
            if !item.is_failure() {
                result.succeeded += 1;
                continue;
            }

            let reason = item.reason();
            let mut record = QuarantineRecord::item(&self.identity, batch, doc, &reason)
                .with_status(item.status);
            if let Some(error) = &item.error {
                record = record.with_details(error.clone());
            }
            self.quarantine.submit(record);
            result.failed.push((doc.display_id().to_string(), reason));
        }

        if !result.failed.is_empty() {
            warn!(
                job = %self.identity,
                batch_no = batch.seq,
                failed = result.failed_count(),
                "Bulk items failed, quarantined individually"
            );
        }
        result
    }

    fn fail_batch(&self, batch: &Batch, reason: String) -> LoadResult {
        warn!(
            job = %self.identity,
            batch_no = batch.seq,
            docs = batch.len(),
            last_key = ?batch.max_key.map(|k| k.to_string()),
            reason = %reason,
            "Batch failed as a whole, quarantining"
        );
        self.quarantine
            .submit(QuarantineRecord::whole_batch(&self.identity, batch, &reason));

        LoadResult {
            succeeded: 0,
            failed: batch
                .docs
                .iter()
                .map(|d| (d.display_id().to_string(), reason.clone()))
                .collect(),
            whole_batch: Some(reason),
            duration: Duration::ZERO,
        }
    }
}
