//! Streamable HTTP JSON-RPC endpoint for one vendor

use std::sync::Arc;

use axum::{
    Json,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::registry::ToolRegistry;
use super::session::SessionManager;
use crate::error::rpc_codes;
use crate::gateway::Lifecycle;
use crate::protocol::{
    Info, InitializeResult, JsonRpcResponse, RequestId, ServerCapabilities, ToolsCallParams,
    ToolsCapability, ToolsListResult, negotiate_version,
};
use crate::vendor::Vendor;

/// Header carrying the session id
pub const SESSION_HEADER: &str = "mcp-session-id";

/// HTTP-level outcome of one MCP request
#[derive(Debug)]
pub struct McpReply {
    /// Response status
    pub status: StatusCode,
    /// JSON-RPC body; absent for accepted notifications
    pub body: Option<JsonRpcResponse>,
    /// Session id to echo in the response header
    pub session_id: Option<String>,
}

impl McpReply {
    fn rpc(status: StatusCode, body: JsonRpcResponse) -> Self {
        Self {
            status,
            body: Some(body),
            session_id: None,
        }
    }

    fn accepted() -> Self {
        Self {
            status: StatusCode::ACCEPTED,
            body: None,
            session_id: None,
        }
    }

    fn with_session(mut self, id: &str) -> Self {
        self.session_id = Some(id.to_string());
        self
    }
}

impl IntoResponse for McpReply {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => (self.status, Json(body)).into_response(),
            None => self.status.into_response(),
        };
        if let Some(id) = self.session_id.and_then(|id| HeaderValue::from_str(&id).ok()) {
            response
                .headers_mut()
                .insert(HeaderName::from_static(SESSION_HEADER), id);
        }
        response
    }
}

/// One vendor's MCP server: sessions plus tools
#[derive(Debug)]
pub struct McpServer {
    sessions: Arc<SessionManager>,
    registry: ToolRegistry,
}

impl McpServer {
    /// Bind a session manager and a tool registry for the same vendor
    #[must_use]
    pub fn new(sessions: Arc<SessionManager>, registry: ToolRegistry) -> Self {
        debug_assert_eq!(sessions.vendor(), registry.vendor());
        Self { sessions, registry }
    }

    /// Vendor served
    #[must_use]
    pub fn vendor(&self) -> Vendor {
        self.registry.vendor()
    }

    /// Handle a `POST` carrying one JSON-RPC message
    pub async fn handle_post(&self, session_id: Option<&str>, body: &[u8]) -> McpReply {
        if !self.sessions.is_running() {
            return not_running();
        }

        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                debug!(vendor = %self.vendor(), error = %e, "Unparseable JSON-RPC body");
                return McpReply::rpc(
                    StatusCode::BAD_REQUEST,
                    JsonRpcResponse::error(None, rpc_codes::PARSE_ERROR, format!("Parse error: {e}")),
                );
            }
        };

        let (id, method, params) = match parse_request(&value) {
            Ok(parsed) => parsed,
            Err(rpc) => return McpReply::rpc(StatusCode::BAD_REQUEST, rpc),
        };

        if method == "initialize" {
            return self.initialize(id, params.as_ref());
        }

        let Some(session_id) = session_id else {
            return McpReply::rpc(
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(
                    id,
                    rpc_codes::SERVER_ERROR_START,
                    "Bad Request: Missing session ID",
                ),
            );
        };
        if !self.sessions.contains(session_id) {
            return McpReply::rpc(
                StatusCode::NOT_FOUND,
                JsonRpcResponse::error(id, -32001, "Session not found"),
            );
        }

        if is_notification_method(&method) {
            debug!(vendor = %self.vendor(), method = %method, "Notification accepted");
            return McpReply::accepted().with_session(session_id);
        }

        // parse_request guarantees an id for everything that is not a notification
        let Some(id) = id else {
            return McpReply::accepted().with_session(session_id);
        };

        let rpc = match method.as_str() {
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.tools_list(id),
            "tools/call" => self.tools_call(id, params).await,
            other => {
                debug!(vendor = %self.vendor(), method = %other, "Method not found");
                JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {other}"),
                )
            }
        };

        McpReply::rpc(StatusCode::OK, rpc).with_session(session_id)
    }

    /// Handle a `DELETE` terminating a session
    #[must_use]
    pub fn handle_delete(&self, session_id: Option<&str>) -> StatusCode {
        if !self.sessions.is_running() {
            return StatusCode::SERVICE_UNAVAILABLE;
        }
        match session_id {
            Some(id) if self.sessions.remove(id) => StatusCode::NO_CONTENT,
            Some(id) => {
                debug!(vendor = %self.vendor(), session_id = %id, "Session not found for DELETE");
                StatusCode::NOT_FOUND
            }
            None => StatusCode::BAD_REQUEST,
        }
    }

    fn initialize(&self, id: Option<RequestId>, params: Option<&Value>) -> McpReply {
        let Some(id) = id else {
            return McpReply::rpc(
                StatusCode::BAD_REQUEST,
                JsonRpcResponse::error(None, rpc_codes::INVALID_REQUEST, "Missing id"),
            );
        };

        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        let version = negotiate_version(requested);
        let session_id = self.sessions.create(version);

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
                ..Default::default()
            },
            server_info: Info {
                name: self.vendor().server_name().to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            instructions: None,
        };

        match serde_json::to_value(result) {
            Ok(value) => McpReply::rpc(StatusCode::OK, JsonRpcResponse::success(id, value))
                .with_session(&session_id),
            Err(e) => McpReply::rpc(
                StatusCode::INTERNAL_SERVER_ERROR,
                JsonRpcResponse::error(Some(id), rpc_codes::INTERNAL_ERROR, e.to_string()),
            ),
        }
    }

    fn tools_list(&self, id: RequestId) -> JsonRpcResponse {
        let result = ToolsListResult {
            tools: self.registry.list(),
            next_cursor: None,
        };
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(Some(id), rpc_codes::INTERNAL_ERROR, e.to_string()),
        }
    }

    async fn tools_call(&self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolsCallParams = match params.map(serde_json::from_value).transpose() {
            Ok(Some(p)) => p,
            Ok(None) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    "Missing tools/call params",
                );
            }
            Err(e) => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    format!("Invalid tools/call params: {e}"),
                );
            }
        };

        let result = self.registry.call(&params.name, &params.arguments).await;
        match serde_json::to_value(result) {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(e) => JsonRpcResponse::error(Some(id), rpc_codes::INTERNAL_ERROR, e.to_string()),
        }
    }
}

fn not_running() -> McpReply {
    warn!("Request received while session manager is not running");
    McpReply::rpc(
        StatusCode::SERVICE_UNAVAILABLE,
        JsonRpcResponse::error(None, rpc_codes::SERVER_ERROR_START, "Server not running"),
    )
}

/// Extract a `RequestId` from a JSON value.
///
/// Supports string and integer ids; anything else is treated as absent.
fn extract_request_id(value: &Value) -> Option<RequestId> {
    if let Some(s) = value.as_str() {
        Some(RequestId::String(s.to_string()))
    } else if let Some(n) = value.as_i64() {
        Some(RequestId::Number(n))
    } else {
        value
            .as_u64()
            .and_then(|n| i64::try_from(n).ok())
            .map(RequestId::Number)
    }
}

fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// Parse a JSON-RPC request or notification into `(id, method, params)`.
///
/// `id` is `None` only for notifications.
#[allow(clippy::result_large_err)]
fn parse_request(
    value: &Value,
) -> Result<(Option<RequestId>, String, Option<Value>), JsonRpcResponse> {
    if value.is_array() {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Batch requests are not supported",
        ));
    }

    if value.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Invalid JSON-RPC version",
        ));
    }

    let id = value.get("id").and_then(extract_request_id);

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| JsonRpcResponse::error(id.clone(), rpc_codes::INVALID_REQUEST, "Missing method"))?;

    if !is_notification_method(method) && id.is_none() {
        return Err(JsonRpcResponse::error(None, rpc_codes::INVALID_REQUEST, "Missing id"));
    }

    Ok((id, method.to_string(), value.get("params").cloned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_id_accepts_strings_and_integers() {
        assert_eq!(
            extract_request_id(&json!("abc-123")),
            Some(RequestId::String("abc-123".to_string()))
        );
        assert_eq!(extract_request_id(&json!(-7)), Some(RequestId::Number(-7)));
        assert_eq!(extract_request_id(&json!(0)), Some(RequestId::Number(0)));
        assert_eq!(extract_request_id(&json!(u64::MAX)), None);
        assert_eq!(extract_request_id(&json!(1.5)), None);
        assert_eq!(extract_request_id(&Value::Null), None);
        assert_eq!(extract_request_id(&json!({"id": 1})), None);
    }

    #[test]
    fn parse_request_valid() {
        let (id, method, params) = parse_request(&json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "search_code"}
        }))
        .unwrap();
        assert_eq!(id, Some(RequestId::Number(3)));
        assert_eq!(method, "tools/call");
        assert_eq!(params, Some(json!({"name": "search_code"})));
    }

    #[test]
    fn parse_request_notification_without_id() {
        let (id, method, _) = parse_request(&json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert_eq!(id, None);
        assert_eq!(method, "notifications/initialized");
    }

    #[test]
    fn parse_request_rejects_wrong_version() {
        let err = parse_request(&json!({"jsonrpc": "1.0", "id": 1, "method": "ping"})).unwrap_err();
        assert_eq!(err.error.unwrap().code, rpc_codes::INVALID_REQUEST);
    }

    #[test]
    fn parse_request_rejects_missing_method() {
        let err = parse_request(&json!({"jsonrpc": "2.0", "id": "x"})).unwrap_err();
        assert_eq!(err.id, Some(RequestId::String("x".to_string())));
        assert_eq!(err.error.unwrap().message, "Missing method");
    }

    #[test]
    fn parse_request_requires_id_for_requests() {
        let err = parse_request(&json!({"jsonrpc": "2.0", "method": "tools/list"})).unwrap_err();
        assert_eq!(err.error.unwrap().message, "Missing id");
    }

    #[test]
    fn parse_request_rejects_batches() {
        let err = parse_request(&json!([{"jsonrpc": "2.0", "id": 1, "method": "ping"}])).unwrap_err();
        assert_eq!(err.error.unwrap().message, "Batch requests are not supported");
    }

    #[test]
    fn accepted_reply_has_no_body() {
        let response = McpReply::accepted().with_session("abc").into_response();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()[SESSION_HEADER], "abc");
    }
}
