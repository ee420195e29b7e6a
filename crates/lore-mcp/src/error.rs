//! Error types for tool execution.

use lore_store::StoreError;
use thiserror::Error;

/// Result type for tool execution.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Error raised while executing a tool.
///
/// Never becomes a JSON-RPC error: the router renders it into an
/// error-flagged tool result.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments could not be decoded or failed validation.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// The storage backend failed.
    #[error("{op} failed: {source}")]
    Backend {
        /// Operation that failed (`search`, `store`, ...).
        op: &'static str,
        #[source]
        source: StoreError,
    },

    /// No tool with this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    /// Create an invalid-arguments error.
    pub fn invalid_arguments(msg: impl Into<String>) -> Self {
        Self::InvalidArguments(msg.into())
    }

    /// Wrap a backend error for `op`.
    pub fn backend(op: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| Self::Backend { op, source }
    }
}
