//! Inbound JSON-RPC message parsing

use serde_json::{Value, json};

use crate::error::rpc_codes;
use crate::protocol::{JsonRpcResponse, RequestId};

/// A well-formed request or notification
#[derive(Debug, Clone, PartialEq)]
pub struct Incoming {
    /// `None` for notifications
    pub id: Option<RequestId>,
    /// Method name
    pub method: String,
    /// Raw params
    pub params: Option<Value>,
}

impl Incoming {
    /// No response is expected
    #[must_use]
    pub fn is_notification(&self) -> bool {
        is_notification_method(&self.method)
    }
}

/// String and integer ids are accepted; anything else counts as missing.
pub(crate) fn extract_request_id(value: &Value) -> Option<RequestId> {
    match value {
        Value::String(s) => Some(RequestId::String(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .map(RequestId::Number),
        _ => None,
    }
}

pub(crate) fn is_notification_method(method: &str) -> bool {
    method.starts_with("notifications/")
}

/// `tools/call` name and arguments; `("", {})` when absent
pub(crate) fn extract_tools_call_params(params: Option<&Value>) -> (&str, Value) {
    let tool_name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("");
    let arguments = params
        .and_then(|p| p.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));
    (tool_name, arguments)
}

/// Check the envelope of one decoded message.
///
/// The error side is the response to send back.
#[allow(clippy::result_large_err)]
pub(crate) fn parse_request(value: &Value) -> Result<Incoming, JsonRpcResponse> {
    let id = value.get("id").and_then(extract_request_id);

    if value.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
        return Err(JsonRpcResponse::error(
            id,
            rpc_codes::INVALID_REQUEST,
            "Invalid JSON-RPC version",
        ));
    }

    let method = value
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            JsonRpcResponse::error(id.clone(), rpc_codes::INVALID_REQUEST, "Missing method")
        })?;

    if !is_notification_method(method) && id.is_none() {
        return Err(JsonRpcResponse::error(
            None,
            rpc_codes::INVALID_REQUEST,
            "Missing id",
        ));
    }

    Ok(Incoming {
        id,
        method: method.to_string(),
        params: value.get("params").cloned(),
    })
}
