//! Kibo Commerce MCP server
//!
//! Exposes a Kibo Commerce tenant to MCP clients as twelve tools covering
//! the catalog, orders, customer accounts and inventory.
//!
//! # Layers
//!
//! - [`auth`]: OAuth2 client-credentials token lifecycle with single-flight
//!   refresh, plus the middleware that injects tenant headers and replays a
//!   request once after a 401
//! - [`api`]: the authenticated request gateway every tool goes through
//! - [`tools`]: tool definitions, argument validation and result envelopes
//! - [`server`]: line-delimited JSON-RPC 2.0 over stdio
//!
//! Logs always go to stderr; stdout carries protocol messages only.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over `level`;
/// `format` is `text` (default) or `json`.
///
/// # Errors
///
/// Returns [`Error::Internal`] if a global subscriber is already set.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    let installed = match format {
        Some("json") => subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => subscriber
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false))
            .try_init(),
    };

    installed.map_err(|e| Error::Internal(format!("Failed to install tracing subscriber: {e}")))
}
