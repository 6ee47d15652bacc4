use crate::{
    execution::identity::JobIdentity,
    records::{batch::Batch, document::TargetDocument},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why a record landed in quarantine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineKind {
    /// The bulk request failed as a whole; one record stands for the batch.
    WholeBatch,

    /// The bulk request was accepted but this document's operation failed.
    Item,
}

impl std::fmt::Display for QuarantineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuarantineKind::WholeBatch => write!(f, "whole_batch"),
            QuarantineKind::Item => write!(f, "item"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailureDetail {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Raw error object as reported by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Operator-facing record of a write that did not land.
///
/// Append-only: the pipeline writes these and never reads them back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuarantineRecord {
    pub id: String,
    pub job: String,
    pub target: String,
    pub partition: Option<String>,
    pub kind: QuarantineKind,
    pub document_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    pub failure: FailureDetail,
    pub batch_seq: usize,
    pub batch_size: usize,
    pub last_key: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl QuarantineRecord {
    fn base(job: &JobIdentity, kind: QuarantineKind, batch: &Batch, message: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job: job.checkpoint_key(),
            target: job.target.clone(),
            partition: job.partition.clone(),
            kind,
            document_ids: Vec::new(),
            payload: None,
            failure: FailureDetail {
                message,
                status: None,
                details: None,
            },
            batch_seq: batch.seq,
            batch_size: batch.len(),
            last_key: batch.max_key.map(|k| k.to_string()),
            recorded_at: Utc::now(),
        }
    }

    /// One record summarising a batch that failed as a unit.
    pub fn whole_batch(job: &JobIdentity, batch: &Batch, message: impl Into<String>) -> Self {
        let mut record = Self::base(job, QuarantineKind::WholeBatch, batch, message.into());
        record.document_ids = batch.ids();
        record
    }

    /// One record for a single failed bulk item, payload included.
    pub fn item(
        job: &JobIdentity,
        batch: &Batch,
        doc: &TargetDocument,
        message: impl Into<String>,
    ) -> Self {
        let mut record = Self::base(job, QuarantineKind::Item, batch, message.into());
        record.document_ids = vec![doc.display_id().to_string()];
        record.payload = Some(Value::Object(doc.fields.clone()));
        record
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.failure.status = Some(status);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.failure.details = Some(details);
        self
    }

    pub fn to_document(&self) -> Value {
        // Plain data; serialization cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
