// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Netpicker Client
//!
//! A resilient client for the multi-tenant Netpicker REST API.
//!
//! ## Features
//!
//! - **Typed Errors**: Every HTTP status and transport failure maps to one error kind
//! - **Retries**: Transient failures retried with capped exponential backoff and jitter
//! - **Two Clients**: Blocking and async, with explicit open/close lifecycle
//! - **Pagination**: Sequential walk or bounded parallel fan-out, always in page order
//! - **Session Cache**: Per-invocation memoization passed explicitly to operations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use netpicker_client::{fetch_all, ApiClient, FetchOptions, Result, Settings};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = ApiClient::new(Settings::from_env());
//!
//!     // One resource
//!     let status = client.get_json("/api/v1/status").await?;
//!
//!     // Every device of the tenant, four pages at a time
//!     let options = FetchOptions::new(100).parallel(4);
//!     let devices = fetch_all(&client, "/api/v1/devices/{tenant}", &options).await?;
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 CLI (get / list / health)                       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────────────┬───────────┴───────────┬──────────────────────┐
//! │  Session Cache   │  Pagination           │  Settings            │
//! ├──────────────────┼───────────────────────┼──────────────────────┤
//! │  CacheKey        │  PageWalk             │  YAML / env / flags  │
//! │  get / get_async │  sequential / fan-out │                      │
//! └──────────────────┴───────────┬───────────┴──────────────────────┘
//!                                │
//! ┌──────────────────────────────┴──────────────────────────────────┐
//! │  ApiClient / BlockingApiClient                                  │
//! │  lifecycle · retry/backoff · rate limit · error mapper          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types and the API error taxonomy
pub mod error;

/// Common types and type aliases
pub mod types;

/// Connection settings
pub mod config;

/// Blocking and async API clients with retry and rate limiting
pub mod http;

/// Multi-page listing aggregation
pub mod pagination;

/// Per-invocation result cache
pub mod cache;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, ErrorKind, Result};
pub use types::*;

// Re-export commonly used types
pub use cache::{CacheEntry, CacheKey, SessionCache};
pub use config::Settings;
pub use http::{ApiClient, ApiRequest, ApiResponse, BlockingApiClient, ClientConfig, RetryPolicy};
pub use pagination::{
    fetch_all, fetch_all_blocking, fetch_all_cached, FetchOptions, Listing, PageConvention,
    PageErrorPolicy,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
