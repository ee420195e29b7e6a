//! Error types for the store crate.

use thiserror::Error;

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or statement failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Outbound HTTP request failed before a response arrived (connect, timeout).
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Remote service answered with a non-success status.
    #[error("{method} {path} returned {status}: {body}")]
    Http {
        /// HTTP method of the failed call.
        method: &'static str,
        /// Request path (without the base URL).
        path: String,
        /// Status code returned by the service.
        status: u16,
        /// Trimmed response body.
        body: String,
    },

    /// Serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Requested learning not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data or state.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Embedding service failure.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The backend has been closed.
    #[error("Backend is closed")]
    Closed,
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
