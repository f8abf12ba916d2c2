//! JSON-RPC 2.0 Message Types
//!
//! MCP uses JSON-RPC 2.0 as its envelope. This module implements the message
//! types shared by both transports: requests, notifications, responses and
//! errors.

use crate::protocol::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC protocol version
pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 Request
///
/// The `id` is chosen by the transport and comes back on the matching
/// response. `params` is omitted from the wire when unset.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,

    /// Correlation id, unique among outstanding requests
    pub id: RequestId,

    /// Method name to invoke
    pub method: String,

    /// Optional parameters for the method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    /// Request without params
    pub fn new(id: impl Into<RequestId>, method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Attach a params object
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// JSON-RPC 2.0 Notification
///
/// Fire-and-forget: no `id`, and the server sends nothing back.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,

    pub method: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Notification without params
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: method.into(),
            params: None,
        }
    }

    /// Attach a params object
    pub fn with_params(mut self, params: Value) -> Self {
        self.params = Some(params);
        self
    }
}

/// JSON-RPC 2.0 Response
///
/// Only the payload is kept. Correlation happens on the raw message before
/// it gets here, and servers are not trusted to send a sane `jsonrpc` or
/// even an `id` (SSE payloads often omit both), so those are not read at all.
/// A well-formed response carries either a result or an error; the XOR rule
/// is enforced by [`JsonRpcResponse::into_result`]. A JSON `null` counts as absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JsonRpcResponse {
    /// Successful result
    #[serde(default)]
    pub result: Option<Value>,

    /// Error object; kept raw because servers disagree on its shape
    #[serde(default)]
    pub error: Option<Value>,
}

impl JsonRpcResponse {
    /// Interpret an already-parsed JSON message as a response
    pub fn from_value(message: Value) -> Result<Self, McpError> {
        serde_json::from_value(message).map_err(McpError::from)
    }

    /// Get the result, failing if the server reported an error or sent neither
    pub fn into_result(self) -> Result<Value, McpError> {
        if let Some(error) = self.error {
            return Err(McpError::ServerError(JsonRpcError::from_value(error)));
        }
        self.result
            .ok_or_else(|| McpError::protocol("response contained neither result nor error"))
    }
}

/// JSON-RPC 2.0 Error Object
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct JsonRpcError {
    /// Error code (negative for protocol errors, positive for application errors)
    #[serde(default)]
    pub code: i64,

    /// Human-readable error message
    pub message: String,

    /// Optional additional error data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Build an error from whatever the server put in the `error` field.
    ///
    /// Objects without a string `message` and non-object values fall back to
    /// their JSON text as the message.
    pub fn from_value(value: Value) -> Self {
        if let Value::Object(map) = &value {
            if let Some(message) = map.get("message").and_then(Value::as_str) {
                return Self {
                    code: map.get("code").and_then(Value::as_i64).unwrap_or_default(),
                    message: message.to_string(),
                    data: map.get("data").cloned(),
                };
            }
        }

        let message = match value {
            Value::String(text) => text,
            other => other.to_string(),
        };
        Self::new(0, message)
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            write!(f, " ({})", data)?;
        }
        Ok(())
    }
}

impl std::error::Error for JsonRpcError {}

/// Request ID - can be a string or number
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String ID
    String(String),
    /// Numeric ID
    Number(u64),
}

impl RequestId {
    /// Read the `id` of a raw JSON message, if it is one we could have issued
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().map(RequestId::Number),
            Value::String(s) => Some(RequestId::String(s.clone())),
            _ => None,
        }
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{}", s),
            RequestId::Number(n) => write!(f, "{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let req = JsonRpcRequest::new(1u64, "tools/list");
        let json = serde_json::to_string(&req).unwrap();
        assert_eq!(json, r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#);
    }

    #[test]
    fn test_request_with_params() {
        let req = JsonRpcRequest::new("abc", "tools/call")
            .with_params(json!({"name": "read_file", "arguments": {"path": "/tmp"}}));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["id"], "abc");
        assert_eq!(value["params"]["name"], "read_file");
    }

    #[test]
    fn test_response_deserialization() {
        let json = r#"{"jsonrpc":"2.0","id":1,"result":{"tools":[]}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.into_result().unwrap(), json!({"tools": []}));
    }

    #[test]
    fn test_sloppy_envelope_fields_are_ignored() {
        let resp = JsonRpcResponse::from_value(json!({
            "jsonrpc": null,
            "id": {"weird": true},
            "result": {"ok": true}
        }))
        .unwrap();
        assert_eq!(resp.into_result().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn test_error_response() {
        let json =
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(json).unwrap();
        match resp.into_result() {
            Err(McpError::ServerError(err)) => {
                assert_eq!(err.code, -32601);
                assert_eq!(err.message, "Method not found");
            }
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[test]
    fn test_response_without_result_or_error_is_protocol_error() {
        let resp = JsonRpcResponse::from_value(json!({"jsonrpc": "2.0", "id": 7})).unwrap();
        assert!(matches!(resp.into_result(), Err(McpError::Protocol(_))));

        let resp = JsonRpcResponse::from_value(json!({"id": 7, "result": null})).unwrap();
        assert!(matches!(resp.into_result(), Err(McpError::Protocol(_))));
    }

    #[test]
    fn test_error_field_wins_over_result() {
        let resp = JsonRpcResponse::from_value(json!({
            "id": 1,
            "result": {"ok": true},
            "error": {"message": "nope"}
        }))
        .unwrap();
        assert!(resp.into_result().unwrap_err().is_server_error());
    }

    #[test]
    fn test_loose_error_shapes() {
        let err = JsonRpcError::from_value(json!("plain failure"));
        assert_eq!(err.message, "plain failure");

        let err = JsonRpcError::from_value(json!({"detail": "no message key"}));
        assert_eq!(err.message, r#"{"detail":"no message key"}"#);
        assert_eq!(err.code, 0);
    }

    #[test]
    fn test_request_id_from_value() {
        assert_eq!(RequestId::from_value(&json!(3)), Some(RequestId::Number(3)));
        assert_eq!(
            RequestId::from_value(&json!("a-b")),
            Some(RequestId::String("a-b".into()))
        );
        assert_eq!(RequestId::from_value(&json!(null)), None);
        assert_eq!(RequestId::from_value(&json!(-1)), None);
    }

    #[test]
    fn test_notification_serialization() {
        let notif = JsonRpcNotification::new("notifications/initialized");
        let json = serde_json::to_string(&notif).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"notifications/initialized\""));
        assert!(!json.contains("\"id\""));
    }
}
