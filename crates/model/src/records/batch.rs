use crate::{pagination::cursor::OrderingKey, records::document::TargetDocument};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct Batch {
    /// 1-based position of the batch within the invocation.
    pub seq: usize,
    pub docs: Vec<TargetDocument>,
    /// Highest key seen in the batch, failed documents included.
    pub max_key: Option<OrderingKey>,
    pub ts: DateTime<Utc>,
}

impl Batch {
    pub fn new(seq: usize, docs: Vec<TargetDocument>) -> Self {
        let max_key = docs.iter().filter_map(|d| d.key).max();
        Self {
            seq,
            docs,
            max_key,
            ts: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn ids(&self) -> Vec<String> {
        self.docs.iter().map(|d| d.display_id().to_string()).collect()
    }
}
