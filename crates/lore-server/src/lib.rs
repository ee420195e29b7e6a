//! HTTP transport for the Lore MCP server.
//!
//! Exposes the protocol dispatcher over the streamable MCP HTTP transport:
//!
//! - `POST /mcp` for JSON-RPC requests, notifications and batches
//! - `GET /mcp` for the (always idle) server-to-client SSE stream
//! - `GET /health` for liveness checks
//!
//! CORS is open to any origin so browser-hosted clients can connect.
//!
//! # Example
//!
//! ```ignore
//! use lore_server::Server;
//! use lore_store::{BackendConfig, open_backend};
//!
//! let backend = open_backend(&BackendConfig::Sqlite { path: "learnings.db".into() }).await?;
//! Server::new(backend)
//!     .run("0.0.0.0:8080".parse()?, tokio::signal::ctrl_c().map(|_| ()))
//!     .await?;
//! ```

pub mod error;
pub mod routes;
pub mod state;

pub use error::{Result, ServerError};
pub use routes::HealthResponse;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use lore_store::SharedBackend;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Lore HTTP server.
#[derive(Debug)]
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server over the given backend.
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            state: AppState::new(backend),
        }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::health_routes())
            .merge(routes::mcp_routes())
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind `addr` and serve until `shutdown` resolves.
    pub async fn run(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener (useful for tests with port 0).
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<()> {
        let local_addr = listener
            .local_addr()
            .map_err(ServerError::Serve)?;
        info!(
            addr = %local_addr,
            backend = self.state.backend_name(),
            "Starting server"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve)?;

        info!("Server stopped");
        Ok(())
    }
}
