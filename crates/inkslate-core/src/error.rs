//! Editor error type.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by the editing engine and its collaborators.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Malformed gesture: {samples} samples")]
    MalformedGesture { samples: usize },
    #[error("Display surface unavailable: {0}")]
    DisplaySurfaceUnavailable(String),
    #[error("Recognition failed: {0}")]
    Recognition(String),
    #[error("Completion failed: {0}")]
    Completion(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Input worker stopped")]
    WorkerStopped,
}

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;
