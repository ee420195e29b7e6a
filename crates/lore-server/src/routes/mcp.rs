//! The streamable MCP endpoint.
//!
//! - `POST /mcp` carries one JSON-RPC message or a batch.
//! - `GET /mcp` opens an SSE stream that only ever sends a greeting ping.
//! - `OPTIONS /mcp` answers CORS preflights.

use std::convert::Infallible;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, Method, StatusCode, header},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::post,
};
use futures::stream::{self, Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

use crate::state::AppState;

/// Largest accepted request body (1 MiB).
pub const MAX_BODY_SIZE: usize = 1 << 20;

/// Session header some MCP clients send and read back.
pub const MCP_SESSION_ID: &str = "mcp-session-id";

/// POST /mcp - Handle a JSON-RPC message or batch.
///
/// Returns 200 with a JSON body when there is anything to answer, and 202
/// with an empty body when every message was a notification.
pub async fn mcp_post_handler(State(state): State<AppState>, body: Bytes) -> Response {
    debug!(bytes = body.len(), "MCP POST");
    match state.dispatcher.handle_message(&body).await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// GET /mcp - Server-initiated message stream.
///
/// Nothing is ever pushed: the stream sends one `ping` event and then stays
/// open with keep-alive comments until the client disconnects.
pub async fn mcp_sse_handler() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("MCP SSE stream opened");
    let greeting = stream::once(async { Ok(Event::default().event("ping").data("{}")) });
    Sse::new(greeting.chain(stream::pending())).keep_alive(KeepAlive::default())
}

/// OPTIONS /mcp - Plain OPTIONS requests that are not CORS preflights.
pub async fn mcp_options_handler() -> StatusCode {
    StatusCode::OK
}

/// CORS policy for browser-hosted MCP clients.
pub fn cors_layer() -> CorsLayer {
    let session_id = HeaderName::from_static(MCP_SESSION_ID);
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, session_id.clone()])
        .expose_headers([session_id])
}

/// Create MCP routes.
pub fn mcp_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/mcp",
            post(mcp_post_handler)
                .get(mcp_sse_handler)
                .options(mcp_options_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(cors_layer())
}
