//! reqwest-backed transport

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{HttpTransport, OutboundRequest, RawResponse};
use crate::{Error, Result};

/// Timeout applied to every Kibo call, authentication included
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the shared HTTP client
///
/// # Errors
///
/// Returns [`Error::Transport`] if the TLS backend cannot be initialised.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(30))
        .tcp_nodelay(true)
        .user_agent(concat!("kibo-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| Error::Transport(e.to_string()))
}

/// [`HttpTransport`] over a [`reqwest::Client`]
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Wrap an existing client
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<RawResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("Failed to read response body: {e}")))?;

        debug!(
            method = %request.method,
            path = request.url.path(),
            status,
            "Kibo API call completed"
        );

        Ok(RawResponse { status, body })
    }
}
