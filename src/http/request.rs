//! Request descriptors and response envelopes

use crate::error::{Error, Result};
use crate::types::{JsonValue, Method, QueryParams};
use bytes::Bytes;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Placeholder substituted with the tenant in request paths
pub const TENANT_PLACEHOLDER: &str = "{tenant}";

/// Description of a single API call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the base URL; may contain `{tenant}`
    pub path: String,
    /// Query parameters, in order
    pub query: QueryParams,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Request body (JSON)
    pub body: Option<JsonValue>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    /// Create a request for the given method and path
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            ..Default::default()
        }
    }

    /// Create a GET request
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Create a POST request
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Create a PATCH request
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Create a DELETE request
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add several query parameters
    #[must_use]
    pub fn queries<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve the path for a tenant
    pub fn resolved_path(&self, tenant: &str) -> String {
        if self.path.contains(TENANT_PLACEHOLDER) {
            self.path
                .replace(TENANT_PLACEHOLDER, &urlencoding::encode(tenant))
        } else {
            self.path.clone()
        }
    }
}

/// Decoded response body
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    /// Body parsed as JSON
    Json(JsonValue),
    /// Body that is not valid JSON
    Raw(Bytes),
    /// No body
    Empty,
}

impl ResponseBody {
    /// Decode raw bytes, falling back to `Raw` when they are not JSON
    pub fn decode(bytes: Bytes) -> Self {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Self::Empty;
        }
        match serde_json::from_slice(&bytes) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(bytes),
        }
    }
}

/// Result of a successful API call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Decoded body
    pub body: ResponseBody,
    raw: Bytes,
}

impl ApiResponse {
    /// Build an envelope from a status, headers and the undecoded payload
    pub fn new(status: u16, headers: HeaderMap, raw: Bytes) -> Self {
        Self {
            status,
            headers,
            body: ResponseBody::decode(raw.clone()),
            raw,
        }
    }

    /// Borrow the JSON body
    pub fn json(&self) -> Result<&JsonValue> {
        match &self.body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Raw(bytes) => Err(Error::unexpected(format!(
                "expected JSON body, got {} bytes of non-JSON data",
                bytes.len()
            ))),
            ResponseBody::Empty => Err(Error::unexpected("expected JSON body, got empty body")),
        }
    }

    /// Take the JSON body; an empty body yields `null`
    pub fn into_json(self) -> Result<JsonValue> {
        match self.body {
            ResponseBody::Json(value) => Ok(value),
            ResponseBody::Empty => Ok(JsonValue::Null),
            ResponseBody::Raw(bytes) => Err(Error::unexpected(format!(
                "expected JSON body, got {} bytes of non-JSON data",
                bytes.len()
            ))),
        }
    }

    /// Deserialize the JSON body
    pub fn parse<T: DeserializeOwned>(self) -> Result<T> {
        let value = self.into_json()?;
        Ok(serde_json::from_value(value)?)
    }

    /// Body exactly as received
    pub fn bytes(&self) -> Bytes {
        self.raw.clone()
    }

    /// Header value as a string, if present and valid
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
