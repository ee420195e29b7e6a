//! HTTP routes.

pub mod health;
pub mod mcp;

pub use health::{HealthResponse, health_routes};
pub use mcp::{MAX_BODY_SIZE, cors_layer, mcp_routes};
