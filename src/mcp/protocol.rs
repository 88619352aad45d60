//! JSON-RPC 2.0 message types used by the MCP stdio transport.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// MCP protocol revision advertised when the client does not name one.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// Incoming request or notification. Notifications carry no `id`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// Outgoing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Parse one line of input.
///
/// Malformed JSON is a parse error; well-formed JSON that is not a request
/// is an invalid request, answered with the `id` if one can be recovered.
pub fn parse_line(line: &str) -> Result<JsonRpcRequest, JsonRpcResponse> {
    let value: Value = serde_json::from_str(line).map_err(|e| {
        JsonRpcResponse::failure(Value::Null, PARSE_ERROR, format!("Parse error: {e}"))
    })?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|e| {
        JsonRpcResponse::failure(id, INVALID_REQUEST, format!("Invalid request: {e}"))
    })
}

/// Wrap a JSON payload as MCP text content.
pub fn text_content(payload: &Value, is_error: bool) -> Value {
    let text = serde_json::to_string_pretty(payload).unwrap_or_else(|_| payload.to_string());
    let mut result = serde_json::json!({
        "content": [{ "type": "text", "text": text }]
    });
    if is_error {
        result["isError"] = Value::Bool(true);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_request_and_notification() {
        let req = parse_line(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#).unwrap();
        assert_eq!(req.id, Some(json!(1)));
        assert_eq!(req.method, "tools/list");
        assert!(req.params.is_null());
        assert!(!req.is_notification());

        let note = parse_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .unwrap();
        assert!(note.is_notification());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        let err = parse_line("{not json").unwrap_err();
        assert_eq!(err.error.unwrap().code, PARSE_ERROR);
        assert_eq!(err.id, Value::Null);
    }

    #[test]
    fn missing_method_is_invalid_request() {
        let err = parse_line(r#"{"jsonrpc":"2.0","id":"abc"}"#).unwrap_err();
        assert_eq!(err.error.unwrap().code, INVALID_REQUEST);
        assert_eq!(err.id, json!("abc"));
    }

    #[test]
    fn response_omits_absent_fields() {
        let ok = serde_json::to_value(JsonRpcResponse::success(json!(1), json!({}))).unwrap();
        assert!(ok.get("error").is_none());
        let err =
            serde_json::to_value(JsonRpcResponse::failure(json!(1), METHOD_NOT_FOUND, "nope"))
                .unwrap();
        assert!(err.get("result").is_none());
        assert_eq!(err["error"]["code"], METHOD_NOT_FOUND);
    }

    #[test]
    fn text_content_pretty_prints_payload() {
        let content = text_content(&json!({"workerId": "w1"}), false);
        let text = content["content"][0]["text"].as_str().unwrap();
        let parsed: Value = serde_json::from_str(text).unwrap();
        assert_eq!(parsed["workerId"], "w1");
        assert!(content.get("isError").is_none());
        assert_eq!(text_content(&json!("boom"), true)["isError"], true);
    }
}
