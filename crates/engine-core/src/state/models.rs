use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Envelope persisted for each checkpoint key.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StoredCheckpoint {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl StoredCheckpoint {
    pub fn now(value: &str) -> Self {
        Self {
            value: value.to_string(),
            updated_at: Utc::now(),
        }
    }
}
