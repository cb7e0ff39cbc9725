//! Auth middleware
//!
//! Decorates an [`HttpTransport`]: headers are injected before each send, and
//! a 401 on a request that has not been replayed yet triggers one forced
//! refresh followed by one replay.

use async_trait::async_trait;
use tracing::warn;

use super::TokenManager;
use crate::Result;
use crate::transport::{HttpTransport, OutboundRequest, RawResponse};

/// [`HttpTransport`] that authenticates every request it forwards
pub struct AuthMiddleware<T> {
    tokens: TokenManager,
    inner: T,
}

impl<T> AuthMiddleware<T> {
    /// Wrap `inner` so that its requests carry credentials from `tokens`
    pub fn new(tokens: TokenManager, inner: T) -> Self {
        Self { tokens, inner }
    }

    /// Token manager backing this middleware
    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for AuthMiddleware<T> {
    async fn send(&self, request: &OutboundRequest) -> Result<RawResponse> {
        let prepared = self.tokens.add_auth_headers(request.clone()).await?;
        let response = self.inner.send(&prepared).await?;
        if !response.is_unauthorized() || request.retried {
            return Ok(response);
        }

        warn!(
            method = %request.method,
            path = request.url.path(),
            "Kibo rejected token, refreshing and replaying once"
        );
        let token = self.tokens.refresh_access_token().await?;
        let mut replay = request.clone();
        replay.retried = true;
        let replay = self.tokens.with_token(replay, &token)?;
        self.inner.send(&replay).await
    }
}
