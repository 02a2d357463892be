//! URL and header construction shared by both clients

use super::client::ClientConfig;
use super::request::ApiRequest;
use crate::config::Settings;
use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION};
use url::Url;

/// Build the absolute URL for a request
///
/// Absolute `http(s)://` paths are used as-is; anything else is joined onto
/// the base URL after `{tenant}` substitution.
pub(crate) fn build_url(settings: &Settings, request: &ApiRequest) -> Result<Url> {
    let path = request.resolved_path(&settings.tenant);
    if path.starts_with("http://") || path.starts_with("https://") {
        return Ok(Url::parse(&path)?);
    }

    let base = settings.base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    Ok(Url::parse(&format!("{base}/{path}"))?)
}

/// Headers sent with every request: bearer auth, JSON accept, configured extras
pub(crate) fn default_headers(settings: &Settings, config: &ClientConfig) -> Result<HeaderMap> {
    let token = settings.require_token()?;

    let mut headers = HeaderMap::new();
    let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| Error::invalid_value("token", "contains characters not allowed in a header"))?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    for (key, value) in &config.default_headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| Error::invalid_value("default_headers", format!("{key}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| Error::invalid_value("default_headers", format!("{key}: {e}")))?;
        headers.insert(name, value);
    }

    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings::builder()
            .base_url("https://np.example.com/")
            .tenant("acme")
            .token("tok")
            .build()
    }

    #[test]
    fn test_build_url_joins_and_substitutes_tenant() {
        let url = build_url(&settings(), &ApiRequest::get("/api/v1/devices/{tenant}")).unwrap();
        assert_eq!(url.as_str(), "https://np.example.com/api/v1/devices/acme");

        let url = build_url(&settings(), &ApiRequest::get("api/v1/status")).unwrap();
        assert_eq!(url.as_str(), "https://np.example.com/api/v1/status");
    }

    #[test]
    fn test_build_url_keeps_absolute_urls() {
        let url = build_url(&settings(), &ApiRequest::get("http://other.example.com/x")).unwrap();
        assert_eq!(url.as_str(), "http://other.example.com/x");
    }

    #[test]
    fn test_default_headers() {
        let config = ClientConfig::builder().header("X-Trace", "1").build();
        let headers = default_headers(&settings(), &config).unwrap();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer tok");
        assert!(headers.get(AUTHORIZATION).unwrap().is_sensitive());
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
        assert_eq!(headers.get("x-trace").unwrap(), "1");
    }

    #[test]
    fn test_default_headers_requires_token() {
        let settings = Settings::builder().build();
        let err = default_headers(&settings, &ClientConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { .. }));
    }
}
