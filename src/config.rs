//! Connection settings
//!
//! [`Settings`] is the immutable value a client is built from. It can be
//! loaded from a YAML file, from `NETPICKER_*` environment variables, or
//! assembled with the builder, and the sources can be layered.

use crate::error::{Error, Result};
use crate::types::OptionStringExt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Base URL used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "https://sandbox.netpicker.io";

/// Tenant used when nothing else is configured
pub const DEFAULT_TENANT: &str = "default";

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: f64 = 30.0;

// ============================================================================
// Settings
// ============================================================================

/// Connection settings for one API endpoint and tenant
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// API base URL, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Tenant namespace embedded in API paths
    #[serde(default = "default_tenant")]
    pub tenant: String,

    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    /// User agent header
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_tenant() -> String {
    DEFAULT_TENANT.to_string()
}

fn default_timeout() -> f64 {
    DEFAULT_TIMEOUT_SECS
}

/// Seconds as a usable timeout: positive and representable as a `Duration`
pub(crate) fn timeout_from_secs(secs: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|t| !t.is_zero())
}

fn default_user_agent() -> String {
    format!("netpicker-client/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            tenant: default_tenant(),
            token: None,
            timeout: default_timeout(),
            insecure: false,
            user_agent: default_user_agent(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .field("insecure", &self.insecure)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Settings {
    /// Create a new settings builder
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Load settings from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary variable lookup
    ///
    /// Recognised variables: `NETPICKER_BASE_URL`, `NETPICKER_TENANT`,
    /// `NETPICKER_TOKEN`, `NETPICKER_TIMEOUT`, `NETPICKER_INSECURE` and
    /// `NETPICKER_VERIFY`. Either `NETPICKER_INSECURE=1` or
    /// `NETPICKER_VERIFY=0` disables TLS verification.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("NETPICKER_BASE_URL")
            .none_if_empty()
            .unwrap_or_else(default_base_url);
        let tenant = lookup("NETPICKER_TENANT")
            .none_if_empty()
            .unwrap_or_else(default_tenant);
        let token = lookup("NETPICKER_TOKEN").none_if_empty();

        let insecure_flag = parse_bool(lookup("NETPICKER_INSECURE").as_deref(), false);
        let verify = parse_bool(lookup("NETPICKER_VERIFY").as_deref(), true);

        let timeout = lookup("NETPICKER_TIMEOUT")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|t| timeout_from_secs(*t).is_some())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            base_url: normalize_base_url(&base_url),
            tenant,
            token,
            timeout,
            insecure: insecure_flag || !verify,
            user_agent: default_user_agent(),
        }
    }

    /// Load settings from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let mut settings: Settings = serde_yaml::from_str(yaml)?;
        settings.base_url = normalize_base_url(&settings.base_url);
        settings.token = settings.token.none_if_empty();
        settings.validate()?;
        Ok(settings)
    }

    /// Check that the settings can be used to build a client
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::invalid_value(
                "base_url",
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        if self.tenant.trim().is_empty() {
            return Err(Error::missing_field("tenant"));
        }
        if timeout_from_secs(self.timeout).is_none() {
            return Err(Error::invalid_value(
                "timeout",
                "must be a positive number of seconds",
            ));
        }
        Ok(())
    }

    /// Request timeout as a duration
    ///
    /// Settings that fail [`validate`](Self::validate) on the timeout get the
    /// default instead.
    pub fn timeout(&self) -> Duration {
        timeout_from_secs(self.timeout)
            .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS))
    }

    /// Bearer token, or an error if none is configured
    pub fn require_token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::missing_field("token"))
    }
}

/// Builder for [`Settings`]
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// Start from existing settings
    pub fn from_settings(settings: Settings) -> Self {
        Self { settings }
    }

    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.settings.base_url = normalize_base_url(&url.into());
        self
    }

    /// Set the tenant
    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.settings.tenant = tenant.into();
        self
    }

    /// Set the bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.settings.token = token.into().none_if_empty();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.settings.timeout = timeout.as_secs_f64();
        self
    }

    /// Disable TLS certificate verification
    pub fn insecure(mut self, insecure: bool) -> Self {
        self.settings.insecure = insecure;
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.settings.user_agent = agent.into();
        self
    }

    /// Build the settings
    pub fn build(self) -> Settings {
        self.settings
    }
}

/// Strip trailing slashes so path joins never produce `//`
fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Parse boolean-like values: 1/true/yes/on and 0/false/no/off
fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_environment_empty() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.tenant, DEFAULT_TENANT);
        assert_eq!(settings.token, None);
        assert_eq!(settings.timeout(), Duration::from_secs(30));
        assert!(!settings.insecure);
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("NETPICKER_BASE_URL", "https://np.example.com/"),
            ("NETPICKER_TENANT", "acme"),
            ("NETPICKER_TOKEN", "tok"),
            ("NETPICKER_TIMEOUT", "12.5"),
            ("NETPICKER_INSECURE", "yes"),
        ]));
        assert_eq!(settings.base_url, "https://np.example.com");
        assert_eq!(settings.tenant, "acme");
        assert_eq!(settings.token.as_deref(), Some("tok"));
        assert_eq!(settings.timeout(), Duration::from_millis(12_500));
        assert!(settings.insecure);
    }

    #[test]
    fn test_verify_zero_means_insecure() {
        let settings = Settings::from_lookup(lookup_from(&[("NETPICKER_VERIFY", "0")]));
        assert!(settings.insecure);

        let settings = Settings::from_lookup(lookup_from(&[("NETPICKER_VERIFY", "maybe")]));
        assert!(!settings.insecure);
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let settings = Settings::from_lookup(lookup_from(&[("NETPICKER_TIMEOUT", "soon")]));
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT_SECS);

        let settings = Settings::from_lookup(lookup_from(&[("NETPICKER_TIMEOUT", "-3")]));
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT_SECS);

        // Finite but too large for a Duration
        let settings = Settings::from_lookup(lookup_from(&[("NETPICKER_TIMEOUT", "1e30")]));
        assert_eq!(settings.timeout, DEFAULT_TIMEOUT_SECS);
        assert_eq!(settings.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate_rejects_unrepresentable_timeout() {
        for secs in [1e30, f64::MAX, 0.0, -1.0, f64::NAN, f64::INFINITY] {
            let settings = Settings {
                timeout: secs,
                ..Settings::default()
            };
            let err = settings.validate().unwrap_err();
            assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "timeout"));
            assert_eq!(settings.timeout(), Duration::from_secs(30));
        }
    }

    #[test]
    fn test_yaml_rejects_huge_timeout() {
        let err = Settings::from_yaml_str("timeout: 1.0e30").unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "timeout"));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "base_url: http://localhost:8000/\ntenant: lab\ntoken: secret\ntimeout: 5"
        )
        .unwrap();

        let settings = Settings::from_yaml_file(file.path()).unwrap();
        assert_eq!(settings.base_url, "http://localhost:8000");
        assert_eq!(settings.tenant, "lab");
        assert_eq!(settings.require_token().unwrap(), "secret");
        assert_eq!(settings.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_yaml_rejects_bad_scheme() {
        let err = Settings::from_yaml_str("base_url: ftp://example.com").unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { ref field, .. } if field == "base_url"));
    }

    #[test]
    fn test_require_token_missing() {
        let settings = Settings::builder().token("").build();
        let err = settings.require_token().unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "token"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let settings = Settings::builder().token("super-secret").build();
        let debug = format!("{settings:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}
