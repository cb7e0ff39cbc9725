//! Token records and the debugging snapshot

use std::fmt;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// A token is treated as expired this long before its real expiry
pub const EXPIRY_BUFFER_SECS: i64 = 5 * 60;

/// Body returned by the client-credentials exchange
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type, `Bearer` when absent
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds
    pub expires_in: u64,
    /// Refresh token (kept, never used for the grant)
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// The live credential. Replaced wholesale on every refresh.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenRecord {
    /// Access token
    pub access_token: String,
    /// Token type (usually "Bearer")
    pub token_type: String,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
    /// Refresh token, if the server issued one
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenRecord {
    /// Build a record from an exchange response received at `issued_at`
    #[must_use]
    pub fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let millis = i64::try_from(response.expires_in)
            .unwrap_or(i64::MAX)
            .saturating_mul(1000);
        let lifetime = TimeDelta::try_milliseconds(millis).unwrap_or(TimeDelta::MAX);
        let expires_at = issued_at
            .checked_add_signed(lifetime)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        Self {
            access_token: response.access_token,
            token_type: response.token_type.unwrap_or_else(default_token_type),
            expires_at,
            refresh_token: response.refresh_token,
        }
    }

    /// Valid iff the expiry is more than [`EXPIRY_BUFFER_SECS`] after `now`
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let threshold = now
            .checked_add_signed(TimeDelta::seconds(EXPIRY_BUFFER_SECS))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.expires_at > threshold
    }

    /// [`Self::is_valid_at`] against the current time
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// Snapshot of the token state, safe to print
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenInfo {
    /// Whether a record exists
    pub has_token: bool,
    /// Expiry of the record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Validity of the record at snapshot time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
}

impl TokenInfo {
    /// Snapshot of an optional record at `now`
    #[must_use]
    pub fn snapshot(record: Option<&TokenRecord>, now: DateTime<Utc>) -> Self {
        match record {
            Some(r) => Self {
                has_token: true,
                expires_at: Some(r.expires_at),
                is_valid: Some(r.is_valid_at(now)),
            },
            None => Self {
                has_token: false,
                expires_at: None,
                is_valid: None,
            },
        }
    }
}
