use crate::execution::state::JobState;
use model::schema::MappingConflict;
use serde::Serialize;
use std::time::Duration;

/// Summary of one job invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobReport {
    pub job: String,
    pub state: JobState,
    /// Requested range, as given.
    pub range: String,
    /// First key actually requested after resuming.
    pub start: Option<String>,
    pub batches: usize,
    pub docs_seen: usize,
    pub docs_loaded: usize,
    pub docs_quarantined: usize,
    pub whole_batch_failures: usize,
    pub checkpoint_failures: usize,
    pub last_key: Option<String>,
    pub schema_created: bool,
    pub conflicts: Vec<MappingConflict>,
    pub duration_ms: u128,
}

impl JobReport {
    pub fn new(job: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            state: JobState::Init,
            range: range.into(),
            start: None,
            batches: 0,
            docs_seen: 0,
            docs_loaded: 0,
            docs_quarantined: 0,
            whole_batch_failures: 0,
            checkpoint_failures: 0,
            last_key: None,
            schema_created: false,
            conflicts: Vec::new(),
            duration_ms: 0,
        }
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration_ms = duration.as_millis();
    }

    pub fn docs_per_sec(&self) -> f64 {
        let secs = (self.duration_ms as f64 / 1000.0).max(f64::EPSILON);
        self.docs_loaded as f64 / secs
    }
}
