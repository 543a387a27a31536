//! Editor error types.

use crate::layer::LayerId;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors surfaced by editor operations.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("Unsupported file type: expected a PNG, JPEG or WebP image")]
    UnsupportedFormat,
    #[error("Could not decode image: {0}")]
    Decode(String),
    #[error("Canvas is not ready")]
    CanvasNotReady,
    #[error("Export failed: {0}")]
    Export(String),
    #[error("Layer not found: {0}")]
    NotFound(LayerId),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for editor operations.
pub type EditorResult<T> = Result<T, EditorError>;
