//! Decoding of HTTP response bodies.
//!
//! A streamable-HTTP server answers a POST either with a bare JSON object or
//! with an event stream of `data: <json>` lines, optionally closed by
//! `data: [DONE]`. Both shapes collapse into one logical result here.

use crate::protocol::{JsonRpcError, McpError};
use serde_json::Value;
use tracing::{debug, trace};

/// Terminator some servers send as the last `data:` payload
const DONE_SENTINEL: &str = "[DONE]";

/// Turn a response body into the request's result.
///
/// Every parsable payload is inspected; the last `error` seen and the last
/// `result` seen are kept. An error wins over any result. Payloads that are
/// not JSON are skipped. A body without any `data:` line is treated as one
/// plain JSON object and must parse.
pub fn decode_body(body: &str) -> Result<Value, McpError> {
    let mut last_error: Option<Value> = None;
    let mut last_result: Option<Value> = None;
    let mut framed = false;

    for line in body.lines() {
        let Some(data) = line.trim_end_matches('\r').strip_prefix("data:") else {
            continue;
        };
        framed = true;

        let data = data.strip_prefix(' ').unwrap_or(data).trim();
        if data.is_empty() || data == DONE_SENTINEL {
            continue;
        }
        match serde_json::from_str::<Value>(data) {
            Ok(message) => take_fields(message, &mut last_error, &mut last_result),
            Err(e) => trace!(error = %e, data = %data, "Skipping unparsable SSE data"),
        }
    }

    if !framed {
        let message: Value = serde_json::from_str(body.trim()).map_err(|e| {
            debug!(error = %e, "Response body is neither SSE nor JSON");
            McpError::protocol(format!("response body is not valid JSON: {}", e))
        })?;
        take_fields(message, &mut last_error, &mut last_result);
    }

    if let Some(error) = last_error {
        return Err(McpError::ServerError(JsonRpcError::from_value(error)));
    }
    last_result.ok_or_else(|| McpError::protocol("no result received from server"))
}

fn take_fields(message: Value, last_error: &mut Option<Value>, last_result: &mut Option<Value>) {
    let Value::Object(mut map) = message else {
        return;
    };
    if let Some(error) = map.remove("error").filter(|e| !e.is_null()) {
        *last_error = Some(error);
    }
    if let Some(result) = map.remove("result").filter(|r| !r.is_null()) {
        *last_result = Some(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sse_result() {
        let body = "data: {\"result\":{\"a\":1}}\ndata: [DONE]";
        assert_eq!(decode_body(body).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn test_later_error_wins_over_earlier_result() {
        let body = "data: {\"result\":{\"a\":1}}\ndata: {\"error\":{\"message\":\"x\"}}\ndata: [DONE]";
        match decode_body(body) {
            Err(McpError::ServerError(err)) => assert_eq!(err.message, "x"),
            other => panic!("expected server error, got {:?}", other),
        }
    }

    #[test]
    fn test_last_result_wins() {
        let body = "event: message\ndata: {\"result\":{\"step\":1}}\n\nevent: message\ndata: {\"result\":{\"step\":2}}\n\n";
        assert_eq!(decode_body(body).unwrap(), json!({"step": 2}));
    }

    #[test]
    fn test_full_envelopes_with_crlf() {
        let body = "event: message\r\ndata: {\"jsonrpc\":\"2.0\",\"id\":\"abc\",\"result\":{\"tools\":[]}}\r\n\r\n";
        assert_eq!(decode_body(body).unwrap(), json!({"tools": []}));
    }

    #[test]
    fn test_unparsable_payloads_are_skipped() {
        let body = "data: not json\ndata: {\"result\":\"ok\"}\ndata: {broken";
        assert_eq!(decode_body(body).unwrap(), json!("ok"));
    }

    #[test]
    fn test_data_without_space() {
        assert_eq!(decode_body("data:{\"result\":5}").unwrap(), json!(5));
    }

    #[test]
    fn test_plain_json_body() {
        let body = r#"{"jsonrpc":"2.0","id":"1","result":{"content":[]}}"#;
        assert_eq!(decode_body(body).unwrap(), json!({"content": []}));

        let body = r#"{"jsonrpc":"2.0","id":"1","error":{"code":-32602,"message":"bad params"}}"#;
        assert!(decode_body(body).unwrap_err().is_server_error());
    }

    #[test]
    fn test_no_result_is_protocol_error() {
        let err = decode_body("data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\ndata: [DONE]")
            .unwrap_err();
        assert!(matches!(err, McpError::Protocol(ref msg) if msg.contains("no result")));

        let err = decode_body(r#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));

        let err = decode_body("data: [DONE]").unwrap_err();
        assert!(matches!(err, McpError::Protocol(ref msg) if msg.contains("no result")));
    }

    #[test]
    fn test_garbage_plain_body_is_protocol_error() {
        let err = decode_body("<html>Bad Gateway</html>").unwrap_err();
        assert!(matches!(err, McpError::Protocol(ref msg) if msg.contains("not valid JSON")));
    }
}
