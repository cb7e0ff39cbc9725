//! Scripted transport for tool tests

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Method;

use crate::Result;
use crate::api::KiboClient;
use crate::transport::{HttpTransport, OutboundRequest, RawResponse};

/// Replies by `(method, path)`; unmatched requests get a 404
#[derive(Default)]
pub(crate) struct Scripted {
    replies: Vec<(Method, String, u16, String)>,
    pub(crate) seen: Mutex<Vec<OutboundRequest>>,
}

impl Scripted {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply(mut self, method: Method, path: &str, status: u16, body: &str) -> Self {
        self.replies
            .push((method, path.to_string(), status, body.to_string()));
        self
    }

    /// Client over this script, plus a handle for inspecting requests
    pub(crate) fn client(self) -> (KiboClient, Arc<Self>) {
        let script = Arc::new(self);
        let client = KiboClient::new("https://kibo.test", script.clone())
            .expect("static host is valid");
        (client, script)
    }

    pub(crate) fn requests(&self) -> Vec<OutboundRequest> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for Scripted {
    async fn send(&self, request: &OutboundRequest) -> Result<RawResponse> {
        self.seen.lock().push(request.clone());
        let found = self
            .replies
            .iter()
            .find(|(m, p, _, _)| *m == request.method && p == request.url.path());
        Ok(match found {
            Some((_, _, status, body)) => RawResponse {
                status: *status,
                body: body.clone(),
            },
            None => RawResponse {
                status: 404,
                body: r#"{"message":"no scripted reply"}"#.to_string(),
            },
        })
    }
}

/// Query value of a recorded request
pub(crate) fn query<'a>(request: &'a OutboundRequest, key: &str) -> Option<&'a str> {
    request
        .query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}
