//! JSON-RPC method dispatch for the MCP server.
//!
//! The dispatcher holds no per-session state; the only shared resource is the
//! backend behind the [`ToolRouter`].

use serde_json::{Value, json};
use tracing::debug;

use crate::protocol::{
    CallToolParams, InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, MCP_PROTOCOL_VERSION, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::tools::{ToolRouter, catalog};
use lore_store::SharedBackend;

/// Guidance returned from `initialize`.
pub const INSTRUCTIONS: &str = "This is a self-improvement MCP server.\n\
IMPORTANT: Call 'lookup_context' with relevant keywords at the START of every conversation before formulating your response.\n\
This allows you to retrieve stored preferences, past learnings, and context about the user.\n\
After conversations where you learn something useful, call 'store_learning' to persist it for future sessions.";

/// Routes JSON-RPC messages to protocol handlers and tools.
#[derive(Clone)]
pub struct Dispatcher {
    router: ToolRouter,
    server_info: ServerInfo,
}

impl Dispatcher {
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            router: ToolRouter::new(backend),
            server_info: ServerInfo::default(),
        }
    }

    /// Handle one HTTP body: a single message or a batch.
    ///
    /// Returns `None` when nothing should be sent back (notifications, or a
    /// batch made only of notifications).
    pub async fn handle_message(&self, body: &[u8]) -> Option<Value> {
        let value: Value = match serde_json::from_slice(body) {
            Ok(value) => value,
            Err(e) => {
                debug!(error = %e, "Unparseable JSON-RPC body");
                let response = JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error(e));
                return Some(json!(response));
            }
        };

        match value {
            Value::Array(items) => {
                let mut responses = Vec::new();
                for item in items {
                    if let Some(response) = self.handle_batch_item(item).await {
                        responses.push(response);
                    }
                }
                if responses.is_empty() {
                    None
                } else {
                    Some(json!(responses))
                }
            }
            single => self.handle_single(single).await.map(|r| json!(r)),
        }
    }

    /// A single message. Shape errors are always answered.
    async fn handle_single(&self, value: Value) -> Option<JsonRpcResponse> {
        match parse_request(value) {
            Ok(request) => self.handle_request(request).await,
            Err((id, error)) => Some(JsonRpcResponse::failure(id.unwrap_or(Value::Null), error)),
        }
    }

    /// A batch element. Shape errors are answered only if an id was readable.
    async fn handle_batch_item(&self, value: Value) -> Option<JsonRpcResponse> {
        match parse_request(value) {
            Ok(request) => self.handle_request(request).await,
            Err((id, error)) => id.map(|id| JsonRpcResponse::failure(id, error)),
        }
    }

    /// Execute a parsed request; notifications run for effect only.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let notification = request.is_notification();
        debug!(method = %request.method, id = ?request.id, "Dispatching");
        let outcome = self.dispatch(&request.method, request.params).await;

        if notification {
            if let Err(error) = &outcome {
                debug!(method = %request.method, code = error.code, error = %error.message, "Notification failed, nothing sent");
            }
            return None;
        }
        let id = request.id?;
        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    async fn dispatch(&self, method: &str, params: Option<Value>) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => to_result(&self.initialize_result()),
            "notifications/initialized" => Ok(Value::Null),
            "ping" => Ok(json!({})),
            "tools/list" => to_result(&ListToolsResult { tools: catalog() }),
            "tools/call" => {
                let params: CallToolParams =
                    serde_json::from_value(params.unwrap_or(Value::Null))
                        .map_err(JsonRpcError::invalid_params)?;
                let result = self.router.call(&params.name, params.arguments).await;
                to_result(&result)
            }
            other => Err(JsonRpcError::method_not_found(other)),
        }
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: self.server_info.clone(),
            instructions: Some(INSTRUCTIONS.to_string()),
        }
    }
}

fn to_result<T: serde::Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(JsonRpcError::internal)
}

/// Decode a request object, recovering the id (if any) on failure.
fn parse_request(value: Value) -> Result<JsonRpcRequest, (Option<Value>, JsonRpcError)> {
    let id = value.get("id").filter(|id| !id.is_null()).cloned();
    if !value.is_object() {
        return Err((id, JsonRpcError::invalid_request("expected a request object")));
    }
    serde_json::from_value(value).map_err(|e| (id, JsonRpcError::invalid_request(e)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use lore_store::MockBackend;

    use super::*;

    fn dispatcher() -> (Dispatcher, Arc<MockBackend>) {
        let backend = Arc::new(MockBackend::new());
        (Dispatcher::new(backend.clone()), backend)
    }

    async fn send(dispatcher: &Dispatcher, body: Value) -> Option<Value> {
        dispatcher.handle_message(body.to_string().as_bytes()).await
    }

    #[tokio::test]
    async fn test_initialize() {
        let (d, _) = dispatcher();
        let resp = send(&d, json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}))
            .await
            .unwrap();
        let result = &resp["result"];
        assert_eq!(resp["id"], 1);
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["capabilities"], json!({"tools": {}}));
        assert_eq!(result["serverInfo"]["name"], "lore");
        assert!(result["instructions"].as_str().unwrap().contains("lookup_context"));
    }

    #[tokio::test]
    async fn test_ping_and_string_id() {
        let (d, _) = dispatcher();
        let resp = send(&d, json!({"jsonrpc": "2.0", "id": "abc", "method": "ping"}))
            .await
            .unwrap();
        assert_eq!(resp, json!({"jsonrpc": "2.0", "id": "abc", "result": {}}));
    }

    #[tokio::test]
    async fn test_tools_list() {
        let (d, _) = dispatcher();
        let resp = send(&d, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
            .await
            .unwrap();
        let tools = resp["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 6);
        assert!(tools.iter().all(|t| t["inputSchema"]["type"] == "object"));
    }

    #[tokio::test]
    async fn test_tools_call_store_then_lookup() {
        let (d, backend) = dispatcher();
        let stored = send(
            &d,
            json!({"jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": {
                "name": "store_learning",
                "arguments": {"category": "preferences", "content": "Prefers concise answers",
                              "tags": "formatting", "confidence": 0.9}
            }}),
        )
        .await
        .unwrap();
        let text = stored["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("ID:1"));
        assert!(text.contains("category 'preferences'"));
        assert!(stored["result"].get("isError").is_none());

        let found = send(
            &d,
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {
                "name": "lookup_context", "arguments": {"query": "concise"}
            }}),
        )
        .await
        .unwrap();
        let text = found["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("confidence:0.9"));
        assert_eq!(backend.get("1").unwrap().use_count, 1);
    }

    #[tokio::test]
    async fn test_tool_failure_is_not_transport_error() {
        let (d, _) = dispatcher();
        let resp = send(
            &d,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {"name": "nope"}}),
        )
        .await
        .unwrap();
        assert!(resp.get("error").is_none());
        assert_eq!(resp["result"]["isError"], true);
    }

    #[tokio::test]
    async fn test_tools_call_bad_params() {
        let (d, _) = dispatcher();
        let resp = send(&d, json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {"arguments": {}}}))
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], JsonRpcError::INVALID_PARAMS);

        let resp = send(&d, json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call"}))
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], JsonRpcError::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (d, _) = dispatcher();
        let resp = send(&d, json!({"jsonrpc": "2.0", "id": 9, "method": "resources/list"}))
            .await
            .unwrap();
        assert_eq!(resp["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
        assert_eq!(resp["error"]["message"], "method not found: resources/list");
        assert_eq!(resp["id"], 9);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let (d, _) = dispatcher();
        let resp = d.handle_message(b"{not json").await.unwrap();
        assert_eq!(resp["error"]["code"], JsonRpcError::PARSE_ERROR);
        assert_eq!(resp["id"], Value::Null);

        let resp = d.handle_message(b"  [ {\"id\": 1, ").await.unwrap();
        assert_eq!(resp["error"]["code"], JsonRpcError::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_request_shapes() {
        let (d, _) = dispatcher();
        let resp = send(&d, json!(42)).await.unwrap();
        assert_eq!(resp["error"]["code"], JsonRpcError::INVALID_REQUEST);
        assert_eq!(resp["id"], Value::Null);

        let resp = send(&d, json!({"jsonrpc": "2.0", "id": 7})).await.unwrap();
        assert_eq!(resp["error"]["code"], JsonRpcError::INVALID_REQUEST);
        assert_eq!(resp["id"], 7);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let (d, backend) = dispatcher();
        assert!(send(&d, json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).await.is_none());
        assert!(send(&d, json!({"jsonrpc": "2.0", "method": "no/such/method"})).await.is_none());

        // Executed for effect even though nothing is returned.
        let note = json!({"jsonrpc": "2.0", "method": "tools/call", "params": {
            "name": "store_learning", "arguments": {"category": "general", "content": "quiet"}
        }});
        assert!(send(&d, note).await.is_none());
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_handle_request_null_id_is_notification() {
        let (d, backend) = dispatcher();
        let request: JsonRpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": null,
            "method": "tools/call",
            "params": {"name": "store_learning", "arguments": {"category": "general", "content": "via null id"}}
        }))
        .unwrap();
        assert!(request.is_notification());
        assert!(d.handle_request(request).await.is_none());
        assert_eq!(backend.len(), 1);

        let failing: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "tools/destroy"})).unwrap();
        assert!(d.handle_request(failing).await.is_none());

        let answered: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 3, "method": "tools/destroy"}))
                .unwrap();
        let response = d.handle_request(answered).await.unwrap();
        assert_eq!(response.id, json!(3));
        assert_eq!(response.error.unwrap().code, JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_batch_skips_notifications_and_matches_single() {
        let (d, _) = dispatcher();
        let request = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        let batch = json!([
            {"jsonrpc": "2.0", "method": "notifications/initialized"},
            request.clone()
        ]);

        let batched = send(&d, batch).await.unwrap();
        let batched = batched.as_array().unwrap();
        assert_eq!(batched.len(), 1);

        let single = send(&d, request).await.unwrap();
        assert_eq!(batched[0], single);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let (d, _) = dispatcher();
        let batch = json!([
            {"jsonrpc": "2.0", "id": "a", "method": "ping"},
            {"jsonrpc": "2.0", "method": "ping"},
            {"jsonrpc": "2.0", "id": "b", "method": "missing"},
            {"jsonrpc": "2.0", "id": "c", "method": "ping"}
        ]);
        let resp = send(&d, batch).await.unwrap();
        let ids: Vec<&Value> = resp.as_array().unwrap().iter().map(|r| &r["id"]).collect();
        assert_eq!(ids, vec![&json!("a"), &json!("b"), &json!("c")]);
        assert_eq!(resp[1]["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_batch_of_notifications_is_silent() {
        let (d, _) = dispatcher();
        let batch = json!([
            {"jsonrpc": "2.0", "method": "notifications/initialized"},
            {"jsonrpc": "2.0", "method": "ping"},
            17
        ]);
        assert!(send(&d, batch).await.is_none());
        assert!(send(&d, json!([])).await.is_none());
    }

    #[tokio::test]
    async fn test_batch_shape_error_with_id_is_answered() {
        let (d, _) = dispatcher();
        let batch = json!([{"jsonrpc": "2.0", "id": 5, "params": {}}]);
        let resp = send(&d, batch).await.unwrap();
        assert_eq!(resp[0]["id"], 5);
        assert_eq!(resp[0]["error"]["code"], JsonRpcError::INVALID_REQUEST);
    }
}
