//! MCP protocol types

mod messages;
mod types;

pub use messages::*;
pub use types::*;

/// Latest MCP protocol version spoken by this server
pub const PROTOCOL_VERSION: &str = "2025-06-18";

/// Protocol versions accepted during `initialize`, newest first
pub const SUPPORTED_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

/// Pick the version to answer `initialize` with: the client's if we speak
/// it, otherwise our latest.
#[must_use]
pub fn negotiate_version(client_version: Option<&str>) -> &'static str {
    client_version
        .and_then(|requested| SUPPORTED_VERSIONS.iter().copied().find(|v| *v == requested))
        .unwrap_or(PROTOCOL_VERSION)
}
