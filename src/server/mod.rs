//! MCP server: JSON-RPC dispatch over the tool registry
//!
//! [`McpServer`] turns one inbound line into at most one response;
//! [`stdio`] drives it over a line-delimited byte stream.

mod request;
pub mod stdio;

pub use request::Incoming;
pub use stdio::{serve, serve_stdio};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use self::request::{extract_tools_call_params, parse_request};
use crate::error::rpc_codes;
use crate::protocol::{
    Info, InitializeResult, JsonRpcResponse, RequestId, ServerCapabilities, ToolsCapability,
    ToolsListResult, negotiate_version,
};
use crate::tools::ToolRegistry;
use crate::Error;

/// Name announced in `serverInfo`
pub const SERVER_NAME: &str = "kibo-commerce-mcp";

const INSTRUCTIONS: &str = "Tools for a Kibo Commerce tenant: catalog (products, categories), \
orders, customer accounts and inventory. Search tools are paginated with startIndex and \
pageSize. Every tool returns a JSON envelope with success, data or error and details. \
kibo_order_status_update changes order state; all other tools are read-only.";

/// JSON-RPC front end for a [`ToolRegistry`]
pub struct McpServer {
    tools: ToolRegistry,
}

impl McpServer {
    /// Serve the given tools
    #[must_use]
    pub fn new(tools: ToolRegistry) -> Self {
        Self { tools }
    }

    /// Registered tools
    #[must_use]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Handle one raw line; `None` means nothing is sent back
    pub async fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        match serde_json::from_str::<Value>(line) {
            Ok(value) => self.handle_value(&value).await,
            Err(e) => {
                debug!(error = %e, "Unparseable message");
                Some(JsonRpcResponse::error(
                    None,
                    rpc_codes::PARSE_ERROR,
                    format!("Parse error: {e}"),
                ))
            }
        }
    }

    /// Handle one decoded message
    pub async fn handle_value(&self, value: &Value) -> Option<JsonRpcResponse> {
        let incoming = match parse_request(value) {
            Ok(incoming) => incoming,
            Err(response) => return Some(response),
        };

        if incoming.is_notification() {
            debug!(method = %incoming.method, "Notification received");
            return None;
        }
        // parse_request guarantees an id for everything but notifications
        let id = incoming.id?;

        debug!(method = %incoming.method, id = %id, "Request received");
        let response = match incoming.method.as_str() {
            "initialize" => Self::handle_initialize(id, incoming.params.as_ref()),
            "ping" => JsonRpcResponse::success(id, Value::Object(serde_json::Map::new())),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, incoming.params.as_ref()).await,
            other => JsonRpcResponse::error(
                Some(id),
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {other}"),
            ),
        };
        Some(response)
    }

    fn handle_initialize(id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let version = negotiate_version(requested);
        let client = params
            .and_then(|p| p.pointer("/clientInfo/name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        info!(client, requested, negotiated = version, "Client initialized");

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: Info {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: Some("Kibo Commerce".to_string()),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        };
        respond(id, &result)
    }

    fn handle_tools_list(&self, id: RequestId) -> JsonRpcResponse {
        respond(
            id,
            &ToolsListResult {
                tools: self.tools.list(),
            },
        )
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<&Value>) -> JsonRpcResponse {
        let (name, arguments) = extract_tools_call_params(params);
        if name.is_empty() {
            return JsonRpcResponse::error(
                Some(id),
                rpc_codes::INVALID_PARAMS,
                "Missing tool name",
            );
        }

        let outcome = self
            .tools
            .call(name, arguments)
            .await
            .and_then(crate::tools::ToolOutcome::into_call_result);
        match outcome {
            Ok(result) => respond(id, &result),
            Err(e) => {
                let message = match e {
                    Error::UnknownTool(_) => e.to_string(),
                    _ => format!("Tool execution failed: {e}"),
                };
                JsonRpcResponse::error(Some(id), e.to_rpc_code(), message)
            }
        }
    }
}

/// Success response carrying `result`, or an internal error if it does
/// not serialize
fn respond<T: Serialize>(id: RequestId, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::error(
            Some(id),
            rpc_codes::INTERNAL_ERROR,
            format!("Failed to serialize result: {e}"),
        ),
    }
}
