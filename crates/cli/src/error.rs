use engine_core::error::{StateError, StoreError};
use engine_runtime::error::ReindexError;
use model::execution::job::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read the job file: {0}")]
    ConfigFileRead(#[from] std::io::Error),

    #[error("Invalid job file: {0}")]
    ConfigParse(#[from] ConfigError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Reindex job failed: {0}")]
    Runner(#[from] ReindexError),

    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    #[error("Checkpoint store error: {0}")]
    State(#[from] StateError),

    #[error("Failed to serialize data to JSON: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}
