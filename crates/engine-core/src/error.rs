use thiserror::Error;

/// Failures reported by a [`DocumentStore`](crate::connectors::store::DocumentStore).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Network or availability failure. Not retried; the job fails and a
    /// rerun resumes from the last checkpoint.
    #[error("Document store unreachable: {0}")]
    Transport(String),

    /// The scroll handle outlived its keep-alive window.
    #[error("Scroll cursor expired: {0}")]
    CursorExpired(String),

    #[error("Index '{0}' not found")]
    IndexNotFound(String),

    #[error("Document store returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected response from document store: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_cursor_expired(&self) -> bool {
        matches!(self, StoreError::CursorExpired(_))
    }

    /// Another writer created the index first.
    pub fn is_already_exists(&self) -> bool {
        match self {
            StoreError::Status { status: 400, body } => {
                body.contains("resource_already_exists_exception")
                    || body.contains("index_already_exists_exception")
            }
            _ => false,
        }
    }
}

/// Failures reported by a [`CheckpointStore`](crate::state::CheckpointStore).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StateError {
    #[error("Checkpoint store failure: {0}")]
    Backend(String),

    /// Another process holds the checkpoint database of this job.
    #[error("Checkpoint database '{0}' is in use by another process")]
    Locked(String),

    #[error("Failed to (de)serialize checkpoint entry: {0}")]
    Serialization(String),

    #[error("Checkpoint '{key}' holds unreadable value '{value}': {reason}")]
    Corrupt {
        key: String,
        value: String,
        reason: String,
    },
}

impl From<sled::Error> for StateError {
    fn from(err: sled::Error) -> Self {
        StateError::Backend(err.to_string())
    }
}

impl From<std::io::Error> for StateError {
    fn from(err: std::io::Error) -> Self {
        StateError::Backend(err.to_string())
    }
}

impl From<bincode::Error> for StateError {
    fn from(err: bincode::Error) -> Self {
        StateError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_concurrent_index_creation() {
        let err = StoreError::Status {
            status: 400,
            body: r#"{"error":{"type":"resource_already_exists_exception"}}"#.into(),
        };
        assert!(err.is_already_exists());
        assert!(!StoreError::Transport("reset".into()).is_already_exists());
        assert!(
            !StoreError::Status {
                status: 500,
                body: "resource_already_exists_exception".into()
            }
            .is_already_exists()
        );
    }
}
