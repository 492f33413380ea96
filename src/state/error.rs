use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Vector index not found at {0}; run build-index first")]
    IndexUnavailable(PathBuf),

    #[error("Vector index at {0} is empty; run build-index first")]
    EmptyIndex(PathBuf),

    #[error("Failed to open vector index: {0}")]
    Index(#[source] anyhow::Error),
}
