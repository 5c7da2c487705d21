//! Result and error types for Cubrir.

use thiserror::Error;

/// Result type for Cubrir operations
pub type CubrirResult<T> = Result<T, CubrirError>;

/// Errors that can occur in Cubrir
#[derive(Debug, Error)]
pub enum CubrirError {
    /// Report rendering failed for one worker/reporter pair
    #[error("Render failed for worker '{worker}': {message}")]
    Render {
        /// Worker whose report failed
        worker: String,
        /// Error message
        message: String,
    },

    /// Key-value store operation not supported by the backing store
    #[error("Store operation not supported: {operation}")]
    UnsupportedStore {
        /// Operation that was attempted
        operation: String,
    },

    /// Key not present in the backing store
    #[error("Key not found in store: {key}")]
    KeyNotFound {
        /// Missing key
        key: String,
    },

    /// Operation called in the wrong lifecycle state
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
