//! JSON-RPC 2.0 message types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
/// Implementation-defined server error used for transport-level rejections.
pub const SERVER_ERROR: i64 = -32000;

/// A request expecting a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: Value, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A one-way message; never answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
        }
    }
}

/// Response to a request. `id` is `null` when the request could not be read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self::error_with_data(id, code, message, None)
    }

    pub fn error_with_data(id: Value, code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data,
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Classification of one inbound JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    /// A client's reply to a server-initiated request.
    Response(JsonRpcResponse),
}

impl IncomingMessage {
    /// Classify a JSON value. Returns `None` if it is not a JSON-RPC 2.0 message.
    pub fn from_value(value: Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return None;
        }

        let has_method = obj.get("method").is_some_and(Value::is_string);
        let has_id = obj.contains_key("id");

        if has_method && has_id {
            serde_json::from_value(value).ok().map(IncomingMessage::Request)
        } else if has_method {
            serde_json::from_value(value).ok().map(IncomingMessage::Notification)
        } else if has_id && (obj.contains_key("result") || obj.contains_key("error")) {
            serde_json::from_value(value).ok().map(IncomingMessage::Response)
        } else {
            None
        }
    }

    pub fn is_initialize(&self) -> bool {
        matches!(self, IncomingMessage::Request(r) if r.method == "initialize")
    }
}

/// True if `payload` (a single message or a batch) carries an `initialize` request.
pub fn is_initialize_payload(payload: &Value) -> bool {
    fn single(v: &Value) -> bool {
        v.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION)
            && v.get("method").and_then(Value::as_str) == Some("initialize")
            && v.get("id").is_some()
    }

    match payload {
        Value::Array(items) => items.iter().any(single),
        other => single(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_messages() {
        let req = IncomingMessage::from_value(json!({"jsonrpc":"2.0","id":1,"method":"ping"})).unwrap();
        assert!(matches!(req, IncomingMessage::Request(ref r) if r.method == "ping"));

        let note = IncomingMessage::from_value(json!({"jsonrpc":"2.0","method":"notifications/initialized"})).unwrap();
        assert!(matches!(note, IncomingMessage::Notification(_)));

        let resp = IncomingMessage::from_value(json!({"jsonrpc":"2.0","id":"a","result":{}})).unwrap();
        assert!(matches!(resp, IncomingMessage::Response(_)));

        assert!(IncomingMessage::from_value(json!({"jsonrpc":"1.0","id":1,"method":"x"})).is_none());
        assert!(IncomingMessage::from_value(json!({"jsonrpc":"2.0","id":1})).is_none());
        assert!(IncomingMessage::from_value(json!([1, 2])).is_none());
    }

    #[test]
    fn test_initialize_detection() {
        let init = json!({"jsonrpc":"2.0","id":1,"method":"initialize","params":{}});
        assert!(is_initialize_payload(&init));
        assert!(is_initialize_payload(&json!([init])));

        // A notification named "initialize" has no id and never opens a session.
        assert!(!is_initialize_payload(&json!({"jsonrpc":"2.0","method":"initialize"})));
        assert!(!is_initialize_payload(&json!({"jsonrpc":"2.0","id":1,"method":"tools/list"})));
    }

    #[test]
    fn test_error_response_shape() {
        let resp = JsonRpcResponse::error(Value::Null, INVALID_REQUEST, "bad");
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v, json!({"jsonrpc":"2.0","id":null,"error":{"code":-32600,"message":"bad"}}));
    }
}
