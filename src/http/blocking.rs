//! Blocking API client
//!
//! Same contract as [`ApiClient`](super::ApiClient) for callers without an
//! async runtime. Every method takes `&mut self`, so one instance serves one
//! caller at a time. Do not use it from inside a tokio runtime thread.

use super::client::ClientConfig;
use super::endpoint::{build_url, default_headers};
use super::lifecycle::ClientState;
use super::mapper::{classify_status, map_transport, parse_retry_after};
use super::rate_limit::RateLimiter;
use super::request::{ApiRequest, ApiResponse};
use super::retry::RetryDecision;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use bytes::Bytes;
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Blocking API client
pub struct BlockingApiClient {
    settings: Settings,
    config: ClientConfig,
    state: ClientState<Client>,
    rate_limiter: Option<RateLimiter>,
}

impl BlockingApiClient {
    /// Create a client with default retry behaviour
    pub fn new(settings: Settings) -> Self {
        Self::with_config(settings, ClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(settings: Settings, config: ClientConfig) -> Self {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        Self {
            settings,
            config,
            state: ClientState::Uninitialized,
            rate_limiter,
        }
    }

    /// Run `f` with an open client and close it afterwards, on success or error
    pub fn scope<T, F>(settings: Settings, config: ClientConfig, f: F) -> Result<T>
    where
        F: FnOnce(&mut BlockingApiClient) -> Result<T>,
    {
        let mut client = Self::with_config(settings, config);
        client.open()?;
        let result = f(&mut client);
        client.close();
        result
    }

    /// Connection settings
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Activate the client explicitly
    pub fn open(&mut self) -> Result<&mut Self> {
        self.handle()?;
        Ok(self)
    }

    /// Release the connection; further requests fail with `ClientClosed`
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if self.state.close().is_some() {
            debug!("Closed blocking API client for {}", self.settings.base_url);
        }
    }

    /// Whether a connection is currently active
    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }

    /// Whether the client has been closed
    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    fn handle(&mut self) -> Result<Client> {
        let settings = &self.settings;
        let config = &self.config;
        let client = self.state.activate(|| build_client(settings, config))?;
        Ok(client.clone())
    }

    /// Make a GET request
    pub fn get(&mut self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::get(path))
    }

    /// Make a GET request and return the JSON body
    pub fn get_json(&mut self, path: &str) -> Result<JsonValue> {
        self.request(ApiRequest::get(path))?.into_json()
    }

    /// Make a GET request and return the body bytes
    pub fn get_binary(&mut self, path: &str) -> Result<Bytes> {
        Ok(self.request(ApiRequest::get(path))?.bytes())
    }

    /// Make a POST request with a JSON body
    pub fn post(&mut self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(ApiRequest::post(path).json(body))
    }

    /// Make a PATCH request with a JSON body
    pub fn patch(&mut self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(ApiRequest::patch(path).json(body))
    }

    /// Make a DELETE request
    pub fn delete(&mut self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::delete(path))
    }

    /// Issue one request, retrying transient failures
    pub fn request(&mut self, request: ApiRequest) -> Result<ApiResponse> {
        let url = build_url(&self.settings, &request)?;
        let timeout = request.timeout.unwrap_or_else(|| self.settings.timeout());
        let client = self.handle()?;
        let policy = &self.config.retry;
        let mut retry = policy.start();

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait_blocking();
            }

            let (error, retry_after) = match send(&client, &request, &url, timeout) {
                Ok(response) => {
                    debug!("Request succeeded: {} {}", request.method, url);
                    return Ok(response);
                }
                Err(failure) => failure,
            };

            match retry.next(&error, retry_after) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        "{} {} failed ({}), attempt {}/{}, retrying in {:?}",
                        request.method,
                        url,
                        error,
                        retry.attempts(),
                        policy.max_attempts(),
                        delay
                    );
                    std::thread::sleep(delay);
                }
                RetryDecision::GiveUp => {
                    debug!(
                        "{} {} failed after {} attempt(s): {}",
                        request.method,
                        url,
                        retry.attempts(),
                        error
                    );
                    return Err(error);
                }
            }
        }
    }
}

impl Drop for BlockingApiClient {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for BlockingApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingApiClient")
            .field("settings", &self.settings)
            .field("config", &self.config)
            .field("active", &self.state.is_active())
            .field("closed", &self.state.is_closed())
            .finish_non_exhaustive()
    }
}

fn build_client(settings: &Settings, config: &ClientConfig) -> Result<Client> {
    settings.validate()?;
    let headers = default_headers(settings, config)?;

    debug!(
        "Opening blocking API client for {} (tenant {})",
        settings.base_url, settings.tenant
    );
    Client::builder()
        .timeout(settings.timeout())
        .user_agent(&settings.user_agent)
        .default_headers(headers)
        .danger_accept_invalid_certs(settings.insecure)
        .build()
        .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))
}

/// One attempt: send, read the body, classify
fn send(
    client: &Client,
    request: &ApiRequest,
    url: &Url,
    timeout: Duration,
) -> std::result::Result<ApiResponse, (Error, Option<Duration>)> {
    let mut req = client
        .request(request.method.into(), url.clone())
        .timeout(timeout);

    for (key, value) in &request.headers {
        req = req.header(key.as_str(), value.as_str());
    }
    if !request.query.is_empty() {
        req = req.query(&request.query);
    }
    if let Some(ref body) = request.body {
        req = req.json(body);
    }

    debug!("{} {}", request.method, url);
    let response = req.send().map_err(|e| (map_transport(&e, timeout), None))?;

    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response
        .bytes()
        .map_err(|e| (map_transport(&e, timeout), None))?;

    match classify_status(status, &headers, &body) {
        Ok(()) => Ok(ApiResponse::new(status, headers, body)),
        Err(error) => Err((error, parse_retry_after(&headers))),
    }
}
