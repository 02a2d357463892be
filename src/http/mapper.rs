//! Error mapping
//!
//! Pure translation from HTTP status codes and transport failures to the
//! crate's [`Error`] taxonomy. The mapping is total: every status resolves to
//! either success or exactly one error variant.

use crate::error::Error;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::error::Error as _;
use std::time::Duration;

/// Longest error body kept in an error message
pub const MAX_BODY_SNIPPET: usize = 500;

/// Classify a completed HTTP exchange
pub fn classify_status(status: u16, headers: &HeaderMap, body: &[u8]) -> Result<(), Error> {
    match status {
        200..=299 => Ok(()),
        400 | 422 => Err(Error::Validation {
            status,
            body: body_snippet(body),
        }),
        401 => Err(Error::Unauthorized {
            body: body_snippet(body),
        }),
        403 => Err(Error::Forbidden {
            body: body_snippet(body),
        }),
        404 => Err(Error::NotFound {
            body: body_snippet(body),
        }),
        429 => Err(Error::RateLimited {
            retry_after: parse_retry_after(headers),
        }),
        402..=499 => Err(Error::ClientError {
            status,
            body: body_snippet(body),
        }),
        500..=599 => Err(Error::ServerError {
            status,
            body: body_snippet(body),
        }),
        _ => Err(Error::unexpected(format!(
            "unexpected HTTP status {status}: {}",
            body_snippet(body)
        ))),
    }
}

/// Classify a transport-level failure
pub fn map_transport(err: &reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        return Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        };
    }
    // Bodies are decoded by `ResponseBody`, so a reqwest body or decode
    // error means the transfer itself broke off.
    if err.is_decode() || err.is_body() {
        return Error::connection(format!(
            "failed to read response body: {}",
            describe_chain(err)
        ));
    }
    if err.is_builder() {
        return Error::Other(format!("failed to build request: {err}"));
    }
    Error::connection(describe_chain(err))
}

/// Read a `Retry-After` header as delta-seconds or an HTTP date
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    parse_retry_after_value(value, Utc::now())
}

/// Parse a `Retry-After` value relative to `now`
pub fn parse_retry_after_value(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    if let Ok(secs) = value.parse::<f64>() {
        if secs.is_finite() && secs >= 0.0 {
            return Some(Duration::from_secs_f64(secs));
        }
        return None;
    }

    let when = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((when - now).to_std().unwrap_or(Duration::ZERO))
}

/// Truncate a response body for inclusion in an error
pub fn body_snippet(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.chars().count() > MAX_BODY_SNIPPET {
        let truncated: String = text.chars().take(MAX_BODY_SNIPPET).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}

fn describe_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
