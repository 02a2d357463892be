//! HTTP client module
//!
//! Provides the blocking and async API clients with retry, backoff, and
//! error mapping.
//!
//! # Features
//!
//! - **Typed Errors**: Every status and transport failure maps to one [`crate::Error`] kind
//! - **Automatic Retries**: 429, 5xx, timeouts and connection failures, with jittered backoff
//! - **Lifecycle**: Lazy or explicit activation, idempotent close, scoped use
//! - **Fan-out**: Bounded-concurrency multi-request execution with ordered results
//! - **Rate Limiting**: Optional token bucket rate limiter using governor

mod blocking;
mod client;
mod endpoint;
mod lifecycle;
pub mod mapper;
mod rate_limit;
mod request;
mod retry;

pub use blocking::BlockingApiClient;
pub use client::{join_bounded, ApiClient, ClientConfig, ClientConfigBuilder};
pub use lifecycle::ClientState;
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use request::{ApiRequest, ApiResponse, ResponseBody, TENANT_PLACEHOLDER};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
