use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const JSONRPC_VERSION: &str = "2.0";

/// Wire error codes. The first five are reserved by JSON-RPC 2.0; the rest
/// belong to the session server and the audit engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RpcErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Internal,
    SessionExpired,
    SessionLimit,
    InvalidSessionConfig,
    /// An engine operation failed; `data.code` names the failure kind.
    Engine,
}

impl RpcErrorCode {
    pub fn as_i32(self) -> i32 {
        match self {
            RpcErrorCode::ParseError => -32700,
            RpcErrorCode::InvalidRequest => -32600,
            RpcErrorCode::MethodNotFound => -32601,
            RpcErrorCode::InvalidParams => -32602,
            RpcErrorCode::Internal => -32603,
            RpcErrorCode::SessionExpired => -32001,
            RpcErrorCode::SessionLimit => -32002,
            RpcErrorCode::InvalidSessionConfig => -32003,
            RpcErrorCode::Engine => -32010,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    /// Target session; requests without one share the "default" session.
    #[serde(default)]
    pub session: Option<String>,
}

impl JsonRpcRequest {
    pub fn is_valid(&self) -> bool {
        self.jsonrpc == JSONRPC_VERSION
    }

    pub fn session_id(&self) -> &str {
        self.session.as_deref().unwrap_or("default")
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_i32(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn failure(id: Option<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            result: None,
            error: Some(error),
            id,
        }
    }

    pub fn fail(id: Option<Value>, code: RpcErrorCode, message: impl Into<String>) -> Self {
        Self::failure(id, JsonRpcError::new(code, message))
    }

    pub fn parse_error() -> Self {
        Self::fail(None, RpcErrorCode::ParseError, "Parse error")
    }

    pub fn invalid_request(id: Option<Value>) -> Self {
        Self::fail(id, RpcErrorCode::InvalidRequest, "Invalid request")
    }

    pub fn method_not_found(id: Option<Value>, method: &str) -> Self {
        Self::fail(id, RpcErrorCode::MethodNotFound, format!("Method not found: {}", method))
    }

    pub fn invalid_params(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::fail(id, RpcErrorCode::InvalidParams, message)
    }

    pub fn internal_error(id: Option<Value>, message: impl Into<String>) -> Self {
        Self::fail(id, RpcErrorCode::Internal, message)
    }

    /// A failed audit/propose/commit/undo. `kind` is `SurgeonError::code()`,
    /// so clients can tell a stale preview from an empty ledger.
    pub fn engine_error(id: Option<Value>, message: impl Into<String>, kind: Option<&str>) -> Self {
        let error = JsonRpcError::new(RpcErrorCode::Engine, message);
        match kind {
            Some(kind) => Self::failure(id, error.with_data(json!({ "code": kind }))),
            None => Self::failure(id, error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: String,
    pub last_activity: String,
    pub request_count: u64,
    pub idle_timeout_secs: u64,
    pub expires_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfigInfo {
    pub max_sessions: usize,
    pub current_sessions: usize,
    pub default_idle_timeout_secs: u64,
    pub max_idle_timeout_secs: u64,
    pub default_policy: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_shared_session() {
        let json = r#"{"jsonrpc":"2.0","method":"propose","params":{"strategy":"fill-median","column":"qty"},"id":1}"#;
        let request: JsonRpcRequest = serde_json::from_str(json).unwrap();

        assert!(request.is_valid());
        assert_eq!(request.session_id(), "default");
        assert_eq!(request.params.unwrap()["strategy"], "fill-median");
    }

    #[test]
    fn test_request_names_session() {
        let json = r#"{"jsonrpc":"2.0","method":"undo","id":"abc","session":"s1"}"#;
        let request: JsonRpcRequest = serde_json::from_str(json).unwrap();

        assert_eq!(request.session_id(), "s1");
        assert!(request.params.is_none());
        assert_eq!(request.id, Some(Value::String("abc".to_string())));
    }

    #[test]
    fn test_old_protocol_version_is_invalid() {
        let request: JsonRpcRequest =
            serde_json::from_str(r#"{"jsonrpc":"1.0","method":"audit"}"#).unwrap();
        assert!(!request.is_valid());
    }

    #[test]
    fn test_success_has_no_error_member() {
        let response = JsonRpcResponse::success(Some(json!(1)), json!({"rows": 5}));
        let wire = serde_json::to_value(&response).unwrap();

        assert_eq!(wire["jsonrpc"], "2.0");
        assert_eq!(wire["result"]["rows"], 5);
        assert!(wire.get("error").is_none());
        assert!(!response.is_error());
    }

    #[test]
    fn test_method_not_found_uses_reserved_code() {
        let response = JsonRpcResponse::method_not_found(Some(json!(1)), "teleport");
        let wire = serde_json::to_value(&response).unwrap();

        assert_eq!(wire["error"]["code"], -32601);
        assert!(wire.get("result").is_none());
    }

    #[test]
    fn test_engine_error_carries_failure_kind() {
        let response = JsonRpcResponse::engine_error(
            Some(json!(2)),
            "Preview is stale",
            Some("stale_preview"),
        );
        let wire = serde_json::to_value(&response).unwrap();

        assert_eq!(wire["error"]["code"], RpcErrorCode::Engine.as_i32());
        assert_eq!(wire["error"]["data"]["code"], "stale_preview");
    }
}
