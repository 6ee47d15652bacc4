use engine_core::error::{StateError, StoreError};
use model::pagination::cursor::KeyRange;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Failed to open scroll over {range}: {source}")]
    Open {
        range: KeyRange,
        #[source]
        source: StoreError,
    },

    #[error("Failed to advance scroll: {source}")]
    Advance {
        #[source]
        source: StoreError,
    },

    #[error("Checkpoint store operation failed: {0}")]
    State(#[from] StateError),
}

impl ProcessingError {
    pub fn is_cursor_expired(&self) -> bool {
        match self {
            ProcessingError::Open { source, .. } | ProcessingError::Advance { source } => {
                source.is_cursor_expired()
            }
            ProcessingError::State(_) => false,
        }
    }
}
