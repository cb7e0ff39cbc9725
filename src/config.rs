//! Configuration management
//!
//! Settings come from an optional YAML file and the process environment
//! (`KIBO_` prefix), environment winning. A `.env` file in the working
//! directory is loaded into the environment first.

use std::fmt;
use std::path::Path;

use figment::{
    Figment, Metadata, Profile, Provider,
    providers::{Env, Format, Yaml},
    value::{Dict, Map, Value},
};
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::{Error, Result};

/// Path of the client-credentials exchange, relative to the API host
pub const AUTH_TICKET_PATH: &str = "/api/platform/applications/authtickets/oauth";

/// Locale used when `KIBO_LOCALE` is unset
pub const DEFAULT_LOCALE: &str = "en-US";

/// Currency used when `KIBO_CURRENCY` is unset
pub const DEFAULT_CURRENCY: &str = "USD";

/// Environment prefix for all Kibo settings
const ENV_PREFIX: &str = "KIBO_";

/// Kibo connection settings, immutable once loaded
#[derive(Clone, PartialEq, Eq)]
pub struct KiboConfig {
    /// API host URL without trailing slash
    pub api_host: String,
    /// Application client id
    pub client_id: String,
    /// Application client secret
    pub client_secret: String,
    /// Tenant id sent as `x-vol-tenant`
    pub tenant_id: u64,
    /// Site id sent as `x-vol-site`
    pub site_id: u64,
    /// Master catalog id sent as `x-vol-master-catalog`
    pub master_catalog_id: Option<u64>,
    /// Locale for API requests
    pub locale: String,
    /// Currency code
    pub currency: String,
}

impl fmt::Debug for KiboConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KiboConfig")
            .field("api_host", &self.api_host)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("site_id", &self.site_id)
            .field("master_catalog_id", &self.master_catalog_id)
            .field("locale", &self.locale)
            .field("currency", &self.currency)
            .finish()
    }
}

/// Settings exactly as the providers deliver them. Every field is optional so
/// that all missing values can be reported in one error.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default, deserialize_with = "scalar_as_string")]
    api_host: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    client_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    client_secret: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    tenant_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    site_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    master_catalog_id: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    locale: Option<String>,
    #[serde(default, deserialize_with = "scalar_as_string")]
    currency: Option<String>,
}

/// YAML scalars arrive typed, so `12345` is a number and `true` a boolean.
/// Everything is folded back to text here.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Flag(bool),
}

fn scalar_as_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Scalar>::deserialize(deserializer)?;
    Ok(value.map(|scalar| match scalar {
        Scalar::Text(s) => s,
        Scalar::Signed(n) => n.to_string(),
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Flag(b) => b.to_string(),
    }))
}

/// `KIBO_*` variables as verbatim strings.
///
/// figment's `Env` parses values, which turns `0042` into `42` and `1.50`
/// into `1.5`; credentials must reach Kibo byte for byte.
struct RawEnv(Env);

impl RawEnv {
    fn prefixed(prefix: &str) -> Self {
        Self(Env::prefixed(prefix))
    }
}

impl Provider for RawEnv {
    fn metadata(&self) -> Metadata {
        self.0.metadata()
    }

    fn data(&self) -> std::result::Result<Map<Profile, Dict>, figment::Error> {
        let dict: Dict = self
            .0
            .iter()
            .map(|(key, value)| (key.into_string(), Value::from(value)))
            .collect();
        Ok(Profile::Default.collect(dict))
    }
}

impl KiboConfig {
    /// Load configuration from `.env`, an optional YAML file and the environment
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file is missing, a required setting is
    /// absent, or a value is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(env_path) => tracing::debug!(path = %env_path.display(), "Loaded env file"),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
        }

        Self::from_figment(Self::figment(path)?)
    }

    /// Build the provider chain: YAML file (if any), then `KIBO_*` variables
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is given but does not exist.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        Ok(figment.merge(RawEnv::prefixed(ENV_PREFIX)))
    }

    /// Extract and validate settings from an already-assembled figment
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming every missing required variable, or
    /// describing the first malformed value.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let raw: RawConfig = figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        let required = [
            ("KIBO_API_HOST", &raw.api_host),
            ("KIBO_CLIENT_ID", &raw.client_id),
            ("KIBO_CLIENT_SECRET", &raw.client_secret),
            ("KIBO_TENANT_ID", &raw.tenant_id),
            ("KIBO_SITE_ID", &raw.site_id),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| non_empty(value).is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "Missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let api_host = parse_host(non_empty(&raw.api_host).unwrap_or_default())?;
        let tenant_id = parse_id("KIBO_TENANT_ID", non_empty(&raw.tenant_id).unwrap_or_default())?;
        let site_id = parse_id("KIBO_SITE_ID", non_empty(&raw.site_id).unwrap_or_default())?;
        let master_catalog_id = non_empty(&raw.master_catalog_id)
            .map(|v| parse_id("KIBO_MASTER_CATALOG_ID", v))
            .transpose()?;

        Ok(Self {
            api_host,
            client_id: non_empty(&raw.client_id).unwrap_or_default().to_string(),
            client_secret: non_empty(&raw.client_secret).unwrap_or_default().to_string(),
            tenant_id,
            site_id,
            master_catalog_id,
            locale: non_empty(&raw.locale).unwrap_or(DEFAULT_LOCALE).to_string(),
            currency: non_empty(&raw.currency).unwrap_or(DEFAULT_CURRENCY).to_string(),
        })
    }

    /// Full URL of the client-credentials exchange
    #[must_use]
    pub fn auth_url(&self) -> String {
        format!("{}{AUTH_TICKET_PATH}", self.api_host)
    }
}

/// Treat empty and whitespace-only values as unset
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_host(value: &str) -> Result<String> {
    let url = Url::parse(value)
        .map_err(|e| Error::Config(format!("KIBO_API_HOST is not a valid URL ({value}): {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "KIBO_API_HOST must use http or https, got {}",
            url.scheme()
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn parse_id(name: &str, value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("{name} must be a numeric id, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn load_yaml(yaml: &str) -> Result<KiboConfig> {
        KiboConfig::from_figment(Figment::new().merge(Yaml::string(yaml)))
    }

    const FULL: &str = "
api_host: https://t12345.sandbox.mozu.com/
client_id: app.kibo.1.0.0.Release
client_secret: s3cret
tenant_id: 12345
site_id: 67890
";

    #[test]
    fn full_config_loads_with_defaults() {
        let config = load_yaml(FULL).unwrap();
        assert_eq!(config.api_host, "https://t12345.sandbox.mozu.com");
        assert_eq!(config.client_id, "app.kibo.1.0.0.Release");
        assert_eq!(config.tenant_id, 12345);
        assert_eq!(config.site_id, 67890);
        assert_eq!(config.master_catalog_id, None);
        assert_eq!(config.locale, "en-US");
        assert_eq!(config.currency, "USD");
    }

    #[test]
    fn auth_url_is_built_from_host() {
        let config = load_yaml(FULL).unwrap();
        assert_eq!(
            config.auth_url(),
            "https://t12345.sandbox.mozu.com/api/platform/applications/authtickets/oauth"
        );
    }

    #[test]
    fn optional_values_override_defaults() {
        let yaml = format!("{FULL}master_catalog_id: 1\nlocale: fr-CA\ncurrency: CAD\n");
        let config = load_yaml(&yaml).unwrap();
        assert_eq!(config.master_catalog_id, Some(1));
        assert_eq!(config.locale, "fr-CA");
        assert_eq!(config.currency, "CAD");
    }

    #[test]
    fn missing_values_are_all_listed() {
        let err = load_yaml("client_id: abc\nsite_id: 2\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required environment variables: \
             KIBO_API_HOST, KIBO_CLIENT_SECRET, KIBO_TENANT_ID"
        );
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let yaml = FULL.replace("client_secret: s3cret", "client_secret: \"\"");
        let err = load_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("KIBO_CLIENT_SECRET"));
    }

    #[test]
    fn non_numeric_tenant_is_rejected() {
        let yaml = FULL.replace("tenant_id: 12345", "tenant_id: abc");
        let err = load_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("KIBO_TENANT_ID")));
    }

    #[test]
    fn non_http_host_is_rejected() {
        let yaml = FULL.replace("https://t12345.sandbox.mozu.com/", "ftp://example.com");
        assert!(load_yaml(&yaml).is_err());
    }

    #[test]
    fn numeric_secret_is_kept_as_text() {
        let yaml = FULL.replace("client_secret: s3cret", "client_secret: 998877");
        let config = load_yaml(&yaml).unwrap();
        assert_eq!(config.client_secret, "998877");
    }

    #[test]
    fn env_values_are_taken_verbatim() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("KIBO_API_HOST", "https://t12345.sandbox.mozu.com/");
            jail.set_env("KIBO_CLIENT_ID", "0042");
            jail.set_env("KIBO_CLIENT_SECRET", "1e3");
            jail.set_env("KIBO_TENANT_ID", "12345");
            jail.set_env("KIBO_SITE_ID", "67890");
            jail.set_env("KIBO_LOCALE", "True");
            jail.set_env("KIBO_CURRENCY", "1.50");

            let config = KiboConfig::from_figment(KiboConfig::figment(None).unwrap()).unwrap();
            assert_eq!(config.client_id, "0042");
            assert_eq!(config.client_secret, "1e3");
            assert_eq!(config.tenant_id, 12345);
            assert_eq!(config.site_id, 67890);
            assert_eq!(config.locale, "True");
            assert_eq!(config.currency, "1.50");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("kibo.yaml", FULL)?;
            jail.set_env("KIBO_CLIENT_ID", "007");

            let config =
                KiboConfig::from_figment(KiboConfig::figment(Some(Path::new("kibo.yaml"))).unwrap())
                    .unwrap();
            assert_eq!(config.client_id, "007");
            assert_eq!(config.client_secret, "s3cret");
            Ok(())
        });
    }

    #[test]
    fn debug_output_redacts_secret() {
        let config = load_yaml(FULL).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("s3cret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn figment_reads_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kibo.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(FULL.as_bytes()).unwrap();
        drop(f);

        let figment = Figment::new().merge(Yaml::file(&path));
        let config = KiboConfig::from_figment(figment).unwrap();
        assert_eq!(config.site_id, 67890);
    }

    #[test]
    fn figment_rejects_missing_file() {
        let err = KiboConfig::figment(Some(Path::new("/nonexistent/kibo.yaml"))).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
