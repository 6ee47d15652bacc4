use crate::execution::state::JobState;
use engine_core::error::{StateError, StoreError};
use engine_processing::error::ProcessingError;
use model::execution::job::ConfigError;
use thiserror::Error;

/// Top-level errors of a reindex job.
#[derive(Debug, Error)]
pub enum ReindexError {
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Checkpoint error: {0}")]
    State(#[from] StateError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Terminal failure of a running job.
    #[error(
        "Job failed in state {state} (last committed key: {}): {source}",
        .last_key.as_deref().unwrap_or("none")
    )]
    Failed {
        state: JobState,
        last_key: Option<String>,
        #[source]
        source: Box<ReindexError>,
    },
}

impl ReindexError {
    /// The scroll handle expired; a rerun resumes from the checkpoint.
    pub fn is_cursor_expired(&self) -> bool {
        match self {
            ReindexError::Store(err) => err.is_cursor_expired(),
            ReindexError::Processing(err) => err.is_cursor_expired(),
            ReindexError::Failed { source, .. } => source.is_cursor_expired(),
            ReindexError::State(_) | ReindexError::Config(_) => false,
        }
    }

    /// State the job was in when it failed, if it got that far.
    pub fn failed_state(&self) -> Option<JobState> {
        match self {
            ReindexError::Failed { state, .. } => Some(*state),
            _ => None,
        }
    }
}
