//! Token Manager
//!
//! Owns the single [`TokenRecord`] and the in-flight refresh marker. All
//! callers that find the token missing or stale while a refresh is running
//! attach to that refresh instead of starting their own.

use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info, warn};
use url::Url;

use super::token::{TokenInfo, TokenRecord, TokenResponse};
use crate::config::KiboConfig;
use crate::transport::OutboundRequest;
use crate::{Error, Result};

/// Outcome of one exchange, shared by every caller attached to it.
/// The error side is the failure cause, already logged.
type RefreshOutcome = std::result::Result<TokenRecord, String>;

type InFlightRefresh = Shared<BoxFuture<'static, RefreshOutcome>>;

/// OAuth2 client-credentials token manager for one Kibo tenant
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    config: Arc<KiboConfig>,
    auth_url: String,
    token: RwLock<Option<TokenRecord>>,
    in_flight: Mutex<Option<InFlightRefresh>>,
}

impl TokenManager {
    /// Create a manager with no token yet
    #[must_use]
    pub fn new(http: Client, config: Arc<KiboConfig>) -> Self {
        let auth_url = config.auth_url();
        Self {
            inner: Arc::new(Inner {
                http,
                config,
                auth_url,
                token: RwLock::new(None),
                in_flight: Mutex::new(None),
            }),
        }
    }

    /// Connection settings this manager authenticates with
    #[must_use]
    pub fn config(&self) -> &KiboConfig {
        &self.inner.config
    }

    /// Obtain the first token. Called once at startup; failure is fatal there.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if the exchange fails.
    pub async fn initialize(&self) -> Result<()> {
        let record = self.coordinated_refresh().await?;
        info!(
            tenant = self.inner.config.tenant_id,
            site = self.inner.config.site_id,
            expires_at = %record.expires_at,
            "Authenticated with Kibo Commerce"
        );
        Ok(())
    }

    /// Run one client-credentials exchange and store the result.
    ///
    /// This bypasses the in-flight marker; prefer
    /// [`Self::refresh_access_token`] when other tasks may be refreshing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] on network failure, non-2xx status or
    /// an undecodable body. The stored record is left untouched.
    pub async fn authenticate(&self) -> Result<TokenRecord> {
        self.inner.exchange().await.map_err(Error::Authentication)
    }

    /// Current token if still valid, otherwise a coordinated refresh
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if a refresh was needed and failed.
    pub async fn get_access_token(&self) -> Result<String> {
        if let Some(token) = self.valid_token() {
            return Ok(token);
        }
        self.refresh_access_token().await
    }

    /// Refresh regardless of apparent validity, joining any refresh already
    /// in flight
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] if the shared exchange failed.
    pub async fn refresh_access_token(&self) -> Result<String> {
        self.coordinated_refresh()
            .await
            .map(|record| record.access_token)
    }

    /// Inject auth and tenant headers. Requests to the auth endpoint pass
    /// through unchanged.
    ///
    /// # Errors
    ///
    /// Propagates token acquisition failures.
    pub async fn add_auth_headers(&self, request: OutboundRequest) -> Result<OutboundRequest> {
        if is_auth_endpoint(&request.url, &self.inner.auth_url) {
            return Ok(request);
        }

        let token = self.get_access_token().await?;
        self.with_token(request, &token)
    }

    /// Inject `token` and the tenant headers without consulting the cache
    ///
    /// # Errors
    ///
    /// Returns an error if a header value is not representable.
    pub fn with_token(&self, mut request: OutboundRequest, token: &str) -> Result<OutboundRequest> {
        if is_auth_endpoint(&request.url, &self.inner.auth_url) {
            return Ok(request);
        }
        let config = &self.inner.config;

        request.set_header("authorization", &format!("Bearer {token}"))?;
        request.set_header("x-vol-tenant", &config.tenant_id.to_string())?;
        request.set_header("x-vol-site", &config.site_id.to_string())?;
        if let Some(catalog) = config.master_catalog_id {
            request.set_header("x-vol-master-catalog", &catalog.to_string())?;
        }

        Ok(request)
    }

    /// Snapshot of the token state for diagnostics
    #[must_use]
    pub fn token_info(&self) -> TokenInfo {
        TokenInfo::snapshot(self.inner.token.read().as_ref(), Utc::now())
    }

    fn valid_token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .as_ref()
            .filter(|record| record.is_valid())
            .map(|record| record.access_token.clone())
    }

    /// Single-flight refresh. A marker whose exchange already finished is
    /// never joined; a marker left behind by a cancelled caller is joined and
    /// driven to completion by whoever attaches next.
    async fn coordinated_refresh(&self) -> Result<TokenRecord> {
        let (refresh, started) = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(pending) if pending.peek().is_none() => (pending.clone(), false),
                _ => {
                    let inner = Arc::clone(&self.inner);
                    let refresh = async move { inner.exchange().await }.boxed().shared();
                    *slot = Some(refresh.clone());
                    (refresh, true)
                }
            }
        };

        if started {
            debug!("Starting token refresh");
        } else {
            debug!("Joining in-flight token refresh");
        }

        let outcome = refresh.clone().await;

        {
            let mut slot = self.inner.in_flight.lock();
            if slot.as_ref().is_some_and(|pending| pending.ptr_eq(&refresh)) {
                *slot = None;
            }
        }

        outcome.map_err(Error::Authentication)
    }
}

impl Inner {
    async fn exchange(&self) -> RefreshOutcome {
        let body = json!({
            "client_id": self.config.client_id,
            "client_secret": self.config.client_secret,
            "grant_type": "client_credentials",
        });

        let response = self
            .http
            .post(&self.auth_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Kibo authentication request failed");
                format!("request failed: {e}")
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "Kibo authentication rejected");
            return Err(format!("HTTP {status} - {body}"));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "Kibo authentication response could not be parsed");
            format!("invalid token response: {e}")
        })?;

        let record = TokenRecord::from_response(token, Utc::now());
        *self.token.write() = Some(record.clone());
        debug!(expires_at = %record.expires_at, "Stored new Kibo access token");
        Ok(record)
    }
}

/// The exchange itself never carries a bearer token
fn is_auth_endpoint(url: &Url, auth_url: &str) -> bool {
    Url::parse(auth_url)
        .is_ok_and(|auth| auth.origin() == url.origin() && auth.path() == url.path())
}
