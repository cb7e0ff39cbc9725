//! In-process mock of the Kibo API used by the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;

use kibo_mcp::config::{AUTH_TICKET_PATH, KiboConfig};

/// One request the mock received
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Behaviour knobs; set before [`MockKibo::start`]
#[derive(Debug, Clone)]
pub struct MockOptions {
    pub expires_in: u64,
    pub auth_delay: Duration,
    pub auth_status: u16,
    /// Ticket requests after this many answer 500
    pub auth_fail_after: Option<usize>,
    /// API requests answered with 401 before normal replies resume
    pub reject_first: usize,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            expires_in: 3600,
            auth_delay: Duration::ZERO,
            auth_status: 200,
            auth_fail_after: None,
            reject_first: 0,
        }
    }
}

#[derive(Default)]
struct MockState {
    options: Mutex<Option<MockOptions>>,
    auth_calls: AtomicUsize,
    unauthorized_left: AtomicUsize,
    replies: Mutex<HashMap<String, Value>>,
    auth_requests: Mutex<Vec<Recorded>>,
    api_requests: Mutex<Vec<Recorded>>,
}

impl MockState {
    fn options(&self) -> MockOptions {
        self.options.lock().clone().unwrap_or_default()
    }
}

/// Running mock server
pub struct MockKibo {
    pub base_url: String,
    state: Arc<MockState>,
}

impl MockKibo {
    pub async fn start(options: MockOptions) -> Self {
        let state = Arc::new(MockState::default());
        state
            .unauthorized_left
            .store(options.reject_first, Ordering::SeqCst);
        *state.options.lock() = Some(options);

        let app = Router::new()
            .route(AUTH_TICKET_PATH, post(auth_ticket))
            .fallback(api)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Serve `body` for GETs and PUTs of `path`
    pub fn reply(&self, path: &str, body: Value) {
        self.state.replies.lock().insert(path.to_string(), body);
    }

    pub fn auth_calls(&self) -> usize {
        self.state.auth_calls.load(Ordering::SeqCst)
    }

    pub fn auth_requests(&self) -> Vec<Recorded> {
        self.state.auth_requests.lock().clone()
    }

    pub fn api_requests(&self) -> Vec<Recorded> {
        self.state.api_requests.lock().clone()
    }

    pub fn config(&self) -> KiboConfig {
        config_for(&self.base_url)
    }
}

pub fn config_for(api_host: &str) -> KiboConfig {
    KiboConfig {
        api_host: api_host.to_string(),
        client_id: "test-client".to_string(),
        client_secret: "test-secret".to_string(),
        tenant_id: 12345,
        site_id: 67890,
        master_catalog_id: None,
        locale: "en-US".to_string(),
        currency: "USD".to_string(),
    }
}

/// A local address nothing is listening on
pub async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn record(method: Method, uri: &Uri, headers: &HeaderMap, body: Option<Value>) -> Recorded {
    let query = uri
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect::<HashMap<_, _>>()
        })
        .unwrap_or_default();
    let headers = headers
        .iter()
        .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
        .collect();
    Recorded {
        method,
        path: uri.path().to_string(),
        query,
        headers,
        body,
    }
}

async fn auth_ticket(
    State(state): State<Arc<MockState>>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let options = state.options();
    state
        .auth_requests
        .lock()
        .push(record(Method::POST, &uri, &headers, Some(body)));
    let n = state.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;

    if !options.auth_delay.is_zero() {
        tokio::time::sleep(options.auth_delay).await;
    }

    let exhausted = options.auth_fail_after.is_some_and(|ok| n > ok);
    if options.auth_status != 200 || exhausted {
        let code = if exhausted { 500 } else { options.auth_status };
        let status = StatusCode::from_u16(code).unwrap();
        return (status, r#"{"message":"invalid client credentials"}"#).into_response();
    }

    Json(json!({
        "access_token": format!("token-{n}"),
        "token_type": "Bearer",
        "expires_in": options.expires_in,
        "refresh_token": format!("refresh-{n}"),
    }))
    .into_response()
}

async fn api(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let body = serde_json::from_str(&body).ok();
    state
        .api_requests
        .lock()
        .push(record(method, &uri, &headers, body));

    let rejected = state
        .unauthorized_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok();
    if rejected {
        return (StatusCode::UNAUTHORIZED, r#"{"message":"token expired"}"#).into_response();
    }

    match state.replies.lock().get(uri.path()) {
        Some(reply) => Json(reply.clone()).into_response(),
        None => (StatusCode::NOT_FOUND, r#"{"message":"not found"}"#).into_response(),
    }
}
