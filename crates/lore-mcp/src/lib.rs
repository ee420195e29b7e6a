//! MCP (Model Context Protocol) server core for Lore.
//!
//! This crate turns JSON-RPC messages into calls on a learning store and
//! back. It knows nothing about HTTP; the server crate hands it raw bodies.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Dispatcher                                                 │
//! │  - single messages and batches                              │
//! │  - initialize, ping, tools/list, tools/call                 │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  ToolRouter                                                 │
//! │  - six tools: decode → validate → backend → render text     │
//! │  - failures become error-flagged results                    │
//! └─────────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//!                  lore_store::SharedBackend
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use lore_mcp::Dispatcher;
//!
//! let dispatcher = Dispatcher::new(backend);
//! let body = br#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
//! if let Some(response) = dispatcher.handle_message(body).await {
//!     println!("{response}");
//! }
//! ```

pub mod dispatcher;
pub mod error;
pub mod protocol;
pub mod tools;

// Re-export main types
pub use dispatcher::{Dispatcher, INSTRUCTIONS};
pub use error::{Result, ToolError};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, MCP_PROTOCOL_VERSION, ServerCapabilities, ServerInfo,
    ToolContent, ToolInfo, ToolsCapability,
};
pub use tools::{ToolRouter, catalog};
