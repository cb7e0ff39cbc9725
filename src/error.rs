//! Error types for the Kibo MCP server

use std::io;

use thiserror::Error;

/// Result type alias for the Kibo MCP server
pub type Result<T> = std::result::Result<T, Error>;

/// Kibo MCP server errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error (missing or malformed settings)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The client-credentials exchange failed
    #[error("Kibo authentication failed: {0}")]
    Authentication(String),

    /// Network-level failure talking to the Kibo API
    #[error("Transport error: {0}")]
    Transport(String),

    /// Kibo API answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Response status code
        status: u16,
        /// Raw response body
        body: String,
    },

    /// Tool arguments failed validation
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// No tool registered under this name
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// JSON-RPC error code used when this error ends a request
    #[must_use]
    pub fn to_rpc_code(&self) -> i32 {
        match self {
            Self::Protocol(_) => rpc_codes::INVALID_REQUEST,
            Self::UnknownTool(_) => rpc_codes::METHOD_NOT_FOUND,
            _ => rpc_codes::INTERNAL_ERROR,
        }
    }
}

/// Standard JSON-RPC error codes
pub mod rpc_codes {
    /// Parse error - Invalid JSON
    pub const PARSE_ERROR: i32 = -32700;
    /// Invalid Request - Not a valid Request object
    pub const INVALID_REQUEST: i32 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i32 = -32603;
}
