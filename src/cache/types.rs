//! Cache key and entry types

use chrono::{DateTime, Utc};
use std::fmt;

/// Identity of a cached result
///
/// Keys compare structurally, so a tenant or operation containing separator
/// characters can never collide with another key. Parameters are kept sorted;
/// the order they were added in does not matter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    tenant: String,
    operation: String,
    params: Vec<(String, String)>,
}

impl CacheKey {
    /// Create a key for an operation within a tenant
    pub fn new(tenant: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            operation: operation.into(),
            params: Vec::new(),
        }
    }

    /// Add a query parameter to the signature
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self.params.sort();
        self
    }

    /// Add several query parameters to the signature
    #[must_use]
    pub fn params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self.params.sort();
        self
    }

    /// Tenant
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Normalized query signature, `k=v` pairs joined with `&`
    pub fn signature(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant, self.operation)?;
        if !self.params.is_empty() {
            write!(f, "?{}", self.signature())?;
        }
        Ok(())
    }
}

/// A cached value and when it was stored
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    /// Cached value
    pub value: V,
    /// Time the value was stored
    pub created_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    /// Wrap a value, stamped now
    pub fn new(value: V) -> Self {
        Self {
            value,
            created_at: Utc::now(),
        }
    }

    /// Time since the value was stored
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}
