//! Outbound HTTP plumbing
//!
//! [`OutboundRequest`] is the descriptor that flows through the auth
//! middleware; an [`HttpTransport`] turns it into a [`RawResponse`].

mod http;

pub use self::http::{DEFAULT_TIMEOUT, ReqwestTransport, build_client};

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use url::Url;

use crate::{Error, Result};

/// A single outbound call, before or after header injection
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute request URL (without query)
    pub url: Url,
    /// Query parameters, in insertion order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: HeaderMap,
    /// JSON body
    pub body: Option<Value>,
    /// Set once the request has been replayed after a 401
    pub retried: bool,
}

impl OutboundRequest {
    /// Create a request with no query, headers or body
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    /// Set a header, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] if `value` is not a legal header value.
    pub fn set_header(&mut self, name: &'static str, value: &str) -> Result<()> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::Internal(format!("Invalid value for header {name}: {e}")))?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(())
    }

    /// Header value as text, if present and printable
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Status and body of a completed exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    /// 2xx status
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 401 status
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Something that can execute an [`OutboundRequest`]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Execute the request. Non-2xx statuses are returned, not raised;
    /// only network-level failures are errors.
    async fn send(&self, request: &OutboundRequest) -> Result<RawResponse>;
}
