//! Async API client with retry and bounded fan-out
//!
//! Provides the concurrent client that handles:
//! - Lazy or explicit session activation, idempotent close
//! - Automatic retries with exponential backoff and jitter
//! - Optional client-side rate limiting
//! - Bounded-concurrency multi-request fan-out with ordered results

use super::endpoint::{build_url, default_headers};
use super::lifecycle::ClientState;
use super::mapper::{classify_status, map_transport, parse_retry_after};
use super::rate_limit::{RateLimiter, RateLimiterConfig};
use super::request::{ApiRequest, ApiResponse};
use super::retry::{RetryDecision, RetryPolicy};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Configuration for client behaviour beyond connection settings
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Retry and backoff policy
    pub retry: RetryPolicy,
    /// Client-side rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Extra headers for all requests
    pub default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for client config
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the retry policy
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .push((key.into(), value.into()));
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Shared state behind every clone of an [`ApiClient`]
struct Inner {
    settings: Arc<Settings>,
    config: ClientConfig,
    state: Mutex<ClientState<Client>>,
    rate_limiter: Option<RateLimiter>,
}

/// Async API client
///
/// Cheap to clone; clones share one connection pool and one lifecycle, so
/// closing any clone closes them all.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

impl ApiClient {
    /// Create a client with default retry behaviour
    pub fn new(settings: Settings) -> Self {
        Self::with_config(settings, ClientConfig::default())
    }

    /// Create a client with custom configuration
    ///
    /// No connection is built until [`open`](Self::open) or the first request.
    pub fn with_config(settings: Settings, config: ClientConfig) -> Self {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        Self {
            inner: Arc::new(Inner {
                settings: Arc::new(settings),
                config,
                state: Mutex::new(ClientState::Uninitialized),
                rate_limiter,
            }),
        }
    }

    /// Run `f` with an open client and close it afterwards, on success or error
    pub async fn scope<T, F, Fut>(settings: Settings, config: ClientConfig, f: F) -> Result<T>
    where
        F: FnOnce(ApiClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let client = Self::with_config(settings, config);
        client.open()?;
        let result = f(client.clone()).await;
        client.close();
        result
    }

    /// Connection settings
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Activate the client explicitly
    pub fn open(&self) -> Result<()> {
        self.handle().map(|_| ())
    }

    /// Release the connection pool; further requests fail with `ClientClosed`
    ///
    /// Safe to call any number of times.
    pub fn close(&self) {
        let released = self.lock_state().close();
        if released.is_some() {
            debug!("Closed API client for {}", self.inner.settings.base_url);
        }
    }

    /// Whether a connection is currently active
    pub fn is_active(&self) -> bool {
        self.lock_state().is_active()
    }

    /// Whether the client has been closed
    pub fn is_closed(&self) -> bool {
        self.lock_state().is_closed()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ClientState<Client>> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Get the live reqwest client, building it on first use
    fn handle(&self) -> Result<Client> {
        let mut state = self.lock_state();
        let client = state.activate(|| self.build_client())?;
        Ok(client.clone())
    }

    fn build_client(&self) -> Result<Client> {
        let settings = &self.inner.settings;
        settings.validate()?;
        let headers = default_headers(settings, &self.inner.config)?;

        debug!(
            "Opening API client for {} (tenant {})",
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

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::get(path)).await
    }

    /// Make a GET request and return the JSON body
    pub async fn get_json(&self, path: &str) -> Result<JsonValue> {
        self.request(ApiRequest::get(path)).await?.into_json()
    }

    /// Make a GET request and return the body bytes
    pub async fn get_binary(&self, path: &str) -> Result<Bytes> {
        Ok(self.request(ApiRequest::get(path)).await?.bytes())
    }

    /// Make a POST request with a JSON body
    pub async fn post(&self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(ApiRequest::post(path).json(body)).await
    }

    /// Make a PATCH request with a JSON body
    pub async fn patch(&self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(ApiRequest::patch(path).json(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(ApiRequest::delete(path)).await
    }

    /// Issue one request, retrying transient failures
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = build_url(&self.inner.settings, &request)?;
        let timeout = request
            .timeout
            .unwrap_or_else(|| self.inner.settings.timeout());
        let policy = &self.inner.config.retry;
        let mut retry = policy.start();

        loop {
            // Re-checked every attempt so a close during backoff stops the loop
            let client = self.handle()?;

            if let Some(ref limiter) = self.inner.rate_limiter {
                limiter.wait().await;
            }

            let (error, retry_after) = match self.send(&client, &request, &url, timeout).await {
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
                    tokio::time::sleep(delay).await;
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

    /// One attempt: send, read the body, classify
    async fn send(
        &self,
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
        let response = req
            .send()
            .await
            .map_err(|e| (map_transport(&e, timeout), None))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| (map_transport(&e, timeout), None))?;

        match classify_status(status, &headers, &body) {
            Ok(()) => Ok(ApiResponse::new(status, headers, body)),
            Err(error) => Err((error, parse_retry_after(&headers))),
        }
    }

    /// Issue many requests with at most `max_concurrency` in flight
    ///
    /// Every request's outcome is returned, paired with its position in
    /// `requests` and sorted by that position.
    pub async fn request_many(
        &self,
        requests: Vec<ApiRequest>,
        max_concurrency: usize,
    ) -> Vec<(usize, Result<ApiResponse>)> {
        join_bounded(
            requests.into_iter().map(|request| self.request(request)),
            max_concurrency,
        )
        .await
        .into_iter()
        .enumerate()
        .collect()
    }

    /// Like [`request_many`](Self::request_many) but stops at the first failure
    ///
    /// No new requests start after an error; requests still in flight are
    /// cancelled when this future returns.
    pub async fn try_request_many(
        &self,
        requests: Vec<ApiRequest>,
        max_concurrency: usize,
    ) -> Result<Vec<ApiResponse>> {
        let total = requests.len();
        let mut slots: Vec<Option<ApiResponse>> = std::iter::repeat_with(|| None).take(total).collect();

        let mut in_flight = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| async move { (index, self.request(request).await) })
            .buffer_unordered(max_concurrency.max(1));

        while let Some((index, result)) = in_flight.next().await {
            slots[index] = Some(result?);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("settings", &self.inner.settings)
            .field("config", &self.inner.config)
            .field("has_rate_limiter", &self.inner.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Drive futures with at most `limit` running at once, returning outputs in
/// input order regardless of completion order
///
/// A `limit` of zero is treated as one.
pub async fn join_bounded<I, Fut, T>(futures: I, limit: usize) -> Vec<T>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = T>,
{
    let mut indexed: Vec<(usize, T)> = stream::iter(futures.into_iter().enumerate())
        .map(|(index, fut)| async move { (index, fut.await) })
        .buffer_unordered(limit.max(1))
        .collect()
        .await;
    indexed.sort_by_key(|(index, _)| *index);
    indexed.into_iter().map(|(_, value)| value).collect()
}
