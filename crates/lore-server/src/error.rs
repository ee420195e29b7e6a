//! Error types for the server.
//!
//! Only startup and the accept loop can fail. Request-level failures are
//! answered in-band as JSON-RPC error objects by the dispatcher.

use std::net::SocketAddr;

use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The listener failed while serving.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;
