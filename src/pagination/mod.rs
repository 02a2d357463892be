//! Pagination module
//!
//! Supports: Page Number, Offset/Limit
//!
//! # Overview
//!
//! Collects every item of a paginated listing. Page 1 is always fetched first;
//! if its envelope reports a total and the caller asked for parallel fetch,
//! the remaining pages are fanned out with bounded concurrency, otherwise they
//! are walked in order until an empty page, the known total, or a short page.
//! Either way the merged items follow page order.

mod aggregator;
mod types;

pub use aggregator::{fetch_all, fetch_all_blocking, fetch_all_cached, listing_cache_key, PageWalk};
pub use types::{FetchOptions, Listing, PageConvention, PageDescriptor, PageErrorPolicy, PageHint};
