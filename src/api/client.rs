//! Authenticated Request Gateway

use std::sync::Arc;

use reqwest::Client;
use serde_json::Value;
use tracing::warn;
use url::Url;

use super::ApiRequest;
use crate::auth::{AuthMiddleware, TokenManager};
use crate::transport::{HttpTransport, OutboundRequest, ReqwestTransport};
use crate::{Error, Result};

/// Executes [`ApiRequest`]s against the configured Kibo host
#[derive(Clone)]
pub struct KiboClient {
    api_host: String,
    transport: Arc<dyn HttpTransport>,
}

impl KiboClient {
    /// Client over an arbitrary transport
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `api_host` is not an absolute URL.
    pub fn new(api_host: &str, transport: Arc<dyn HttpTransport>) -> Result<Self> {
        Url::parse(api_host)
            .map_err(|e| Error::Config(format!("Invalid API host {api_host}: {e}")))?;
        Ok(Self {
            api_host: api_host.trim_end_matches('/').to_string(),
            transport,
        })
    }

    /// Client whose requests go through [`AuthMiddleware`] over `http`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configured host is not a URL.
    pub fn authenticated(tokens: TokenManager, http: Client) -> Result<Self> {
        let api_host = tokens.config().api_host.clone();
        let transport = AuthMiddleware::new(tokens, ReqwestTransport::new(http));
        Self::new(&api_host, Arc::new(transport))
    }

    /// Execute a request and decode its JSON body.
    ///
    /// An empty 2xx body yields `Value::Null`; a non-JSON one is returned as
    /// a string. Failures are logged and returned unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::HttpStatus`] for non-2xx responses
    /// - [`Error::Transport`] for network failures
    /// - [`Error::Authentication`] if a needed token refresh failed
    pub async fn execute(&self, request: ApiRequest) -> Result<Value> {
        let url = self.resolve(&request.path)?;
        let method = request.method.clone();
        let path = request.path.clone();

        let mut outbound = OutboundRequest::new(request.method, url);
        outbound.query = request.query;
        outbound.body = request.body;

        let response = match self.transport.send(&outbound).await {
            Ok(response) => response,
            Err(e) => {
                warn!(method = %method, path = %path, error = %e, "Kibo API request failed");
                return Err(e);
            }
        };

        if !response.is_success() {
            warn!(
                method = %method,
                path = %path,
                status = response.status,
                body = %response.body,
                "Kibo API returned an error"
            );
            return Err(Error::HttpStatus {
                status: response.status,
                body: response.body,
            });
        }

        if response.body.trim().is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_str(&response.body) {
            Ok(value) => Ok(value),
            Err(_) => Ok(Value::String(response.body)),
        }
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        let joined = if path.starts_with('/') {
            format!("{}{path}", self.api_host)
        } else {
            format!("{}/{path}", self.api_host)
        };
        Url::parse(&joined).map_err(|e| Error::Internal(format!("Invalid request URL {joined}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::RawResponse;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    /// Replies with a fixed response and records what it was sent
    struct Canned {
        status: u16,
        body: &'static str,
        seen: Mutex<Vec<OutboundRequest>>,
    }

    impl Canned {
        fn new(status: u16, body: &'static str) -> Arc<Self> {
            Arc::new(Self {
                status,
                body,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for Canned {
        async fn send(&self, request: &OutboundRequest) -> Result<RawResponse> {
            self.seen.lock().push(request.clone());
            Ok(RawResponse {
                status: self.status,
                body: self.body.to_string(),
            })
        }
    }

    struct Unreachable;

    #[async_trait]
    impl HttpTransport for Unreachable {
        async fn send(&self, _request: &OutboundRequest) -> Result<RawResponse> {
            Err(Error::Transport("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn decodes_json_body() {
        let canned = Canned::new(200, r#"{"items":[1,2]}"#);
        let client = KiboClient::new("https://kibo.test/", canned.clone()).unwrap();
        let value = client
            .execute(ApiRequest::get("/api/commerce/orders").query("pageSize", 2))
            .await
            .unwrap();
        assert_eq!(value, json!({"items": [1, 2]}));

        let seen = canned.seen.lock();
        assert_eq!(seen[0].url.as_str(), "https://kibo.test/api/commerce/orders");
        assert_eq!(seen[0].query, vec![("pageSize".to_string(), "2".to_string())]);
    }

    #[tokio::test]
    async fn empty_body_is_null() {
        let client = KiboClient::new("https://kibo.test", Canned::new(204, "")).unwrap();
        let value = client.execute(ApiRequest::delete("/x")).await.unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn non_success_becomes_http_status_error() {
        let client =
            KiboClient::new("https://kibo.test", Canned::new(404, r#"{"message":"nope"}"#)).unwrap();
        let err = client.execute(ApiRequest::get("/x")).await.unwrap_err();
        match err {
            Error::HttpStatus { status, body } => {
                assert_eq!(status, 404);
                assert!(body.contains("nope"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn transport_error_is_returned_unchanged() {
        let client = KiboClient::new("https://kibo.test", Arc::new(Unreachable)).unwrap();
        let err = client.execute(ApiRequest::get("/x")).await.unwrap_err();
        assert!(matches!(err, Error::Transport(ref m) if m == "connection refused"));
    }

    #[tokio::test]
    async fn body_is_forwarded() {
        let canned = Canned::new(200, "{}");
        let client = KiboClient::new("https://kibo.test", canned.clone()).unwrap();
        client
            .execute(ApiRequest::put("/api/commerce/orders/7", json!({"status": "Closed"})))
            .await
            .unwrap();
        let seen = canned.seen.lock();
        assert_eq!(seen[0].method, reqwest::Method::PUT);
        assert_eq!(seen[0].body, Some(json!({"status": "Closed"})));
    }

    #[test]
    fn invalid_host_is_rejected() {
        assert!(KiboClient::new("not a url", Arc::new(Unreachable)).is_err());
    }
}
