//! Session cache module
//!
//! Memoizes API results for the lifetime of one command invocation.
//! A cache is an ordinary value: create it, pass it to the operations that
//! should share results, drop it when the invocation ends.

mod session;
mod types;

pub use session::SessionCache;
pub use types::{CacheEntry, CacheKey};
