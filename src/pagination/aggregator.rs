//! Multi-page aggregation
//!
//! [`PageWalk`] holds the page-by-page bookkeeping (envelope parsing, stop
//! conditions, dedup, failure policy) so the async and blocking entry points
//! only differ in how they issue requests.

use super::types::{FetchOptions, Listing, PageDescriptor, PageErrorPolicy, PageHint};
use crate::cache::{CacheKey, SessionCache};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::http::{ApiClient, ApiRequest, ApiResponse, BlockingApiClient, ResponseBody};
use crate::types::{lookup_path, lookup_u64, JsonValue};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// State of one listing walk
#[derive(Debug)]
pub struct PageWalk<'a> {
    path: &'a str,
    options: &'a FetchOptions,
    hint: Option<PageHint>,
    items: Vec<JsonValue>,
    seen: HashSet<String>,
    pages_fetched: u64,
    skipped_pages: Vec<u64>,
}

impl<'a> PageWalk<'a> {
    /// Start a walk over `path`
    pub fn new(path: &'a str, options: &'a FetchOptions) -> Self {
        Self {
            path,
            options,
            hint: None,
            items: Vec::new(),
            seen: HashSet::new(),
            pages_fetched: 0,
            skipped_pages: Vec::new(),
        }
    }

    /// Hint read from page 1
    pub fn hint(&self) -> Option<PageHint> {
        self.hint
    }

    /// Descriptor for the 1-based page `index`
    pub fn page(&self, index: u64) -> PageDescriptor {
        PageDescriptor {
            index,
            size: self.options.effective_page_size(),
            hint: self.hint,
        }
    }

    /// Request for a page: caller filters first, then the page parameters
    pub fn request(&self, page: &PageDescriptor) -> ApiRequest {
        ApiRequest::get(self.path)
            .queries(self.options.query.iter().cloned())
            .queries(self.options.convention.params(page.index, page.size))
    }

    /// Last page to fetch, when page 1 carried a hint
    pub fn last_page(&self) -> Option<u64> {
        let hint = self.hint?;
        Some(
            hint.last_page(self.options.effective_page_size())
                .min(self.options.max_pages),
        )
    }

    /// Record page 1 and read its hint
    ///
    /// Returns whether more pages should be requested.
    pub fn accept_first(&mut self, response: &ApiResponse) -> Result<bool> {
        let body = response_json(response)?;
        if let JsonValue::Object(_) = body {
            self.hint = PageHint::new(
                lookup_u64(body, &self.options.total_field),
                lookup_u64(body, &self.options.pages_field),
            );
        }
        debug!("Listing {} page 1 hint: {:?}", self.path, self.hint);
        self.accept(1, response)
    }

    /// Record a successful page
    ///
    /// Returns whether a sequential walk should continue past it.
    pub fn accept(&mut self, index: u64, response: &ApiResponse) -> Result<bool> {
        let items = extract_items(response_json(response)?, &self.options.items_field)?;
        let count = items.len() as u64;

        self.pages_fetched += 1;
        for item in items {
            self.push(item);
        }

        Ok(self.has_more_after(index, count))
    }

    /// Record a failed page according to the failure policy
    ///
    /// Under `Fail` the error is returned. Under `Skip` the page is noted and
    /// the walk continues only when the hint says later pages exist.
    pub fn reject(&mut self, index: u64, error: Error) -> Result<bool> {
        match self.options.on_page_error {
            PageErrorPolicy::Fail => Err(error),
            PageErrorPolicy::Skip => {
                warn!("Skipping page {} of {}: {}", index, self.path, error);
                self.skipped_pages.push(index);
                Ok(self.last_page().is_some_and(|last| index < last))
            }
        }
    }

    /// Record the outcome of a page, applying the failure policy on error
    pub fn settle(&mut self, index: u64, outcome: Result<ApiResponse>) -> Result<bool> {
        match outcome.and_then(|response| self.accept(index, &response)) {
            Ok(more) => Ok(more),
            Err(error) => self.reject(index, error),
        }
    }

    /// Finish the walk
    pub fn finish(self) -> Listing {
        debug!(
            "Listing {} complete: {} items from {} pages ({} skipped)",
            self.path,
            self.items.len(),
            self.pages_fetched,
            self.skipped_pages.len()
        );
        Listing {
            items: self.items,
            total: self.hint.and_then(|h| h.total_items),
            pages_fetched: self.pages_fetched,
            skipped_pages: self.skipped_pages,
        }
    }

    fn push(&mut self, item: JsonValue) {
        if let Some(ref key_path) = self.options.unique_key {
            if let Some(key) = lookup_path(&item, key_path) {
                if !self.seen.insert(key.to_string()) {
                    return;
                }
            }
        }
        self.items.push(item);
    }

    fn has_more_after(&self, index: u64, count: u64) -> bool {
        if count == 0 || index >= self.options.max_pages {
            return false;
        }
        if let Some(last) = self.last_page() {
            return index < last;
        }
        !(self.options.stop_on_short_page && count < self.options.effective_page_size())
    }
}

fn response_json(response: &ApiResponse) -> Result<&JsonValue> {
    static NULL: JsonValue = JsonValue::Null;
    match response.body {
        ResponseBody::Empty => Ok(&NULL),
        _ => response.json(),
    }
}

/// Items of one page: the body itself when it is an array, otherwise the
/// array at `items_field`
fn extract_items(body: &JsonValue, items_field: &str) -> Result<Vec<JsonValue>> {
    let items = match body {
        JsonValue::Array(_) => Some(body),
        JsonValue::Object(_) => lookup_path(body, items_field),
        JsonValue::Null => None,
        other => {
            return Err(Error::unexpected(format!(
                "expected a list page, got {}",
                json_type(other)
            )))
        }
    };

    match items {
        None | Some(JsonValue::Null) => Ok(Vec::new()),
        Some(JsonValue::Array(items)) => Ok(items.clone()),
        Some(other) => Err(Error::unexpected(format!(
            "field '{items_field}' is {}, expected an array",
            json_type(other)
        ))),
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

fn deadline_error(deadline: Duration) -> Error {
    Error::Timeout {
        timeout_ms: deadline.as_millis() as u64,
    }
}

/// Fetch every page of a listing
///
/// Pages 2..N are fanned out through [`ApiClient::request_many`] when
/// `options.parallel` is set and page 1 carried a total; otherwise pages
/// are walked one at a time. Items always come back in page order.
pub async fn fetch_all(client: &ApiClient, path: &str, options: &FetchOptions) -> Result<Listing> {
    match options.deadline {
        Some(deadline) => tokio::time::timeout(deadline, walk(client, path, options))
            .await
            .map_err(|_| deadline_error(deadline))?,
        None => walk(client, path, options).await,
    }
}

async fn walk(client: &ApiClient, path: &str, options: &FetchOptions) -> Result<Listing> {
    let mut walk = PageWalk::new(path, options);

    let first = client.request(walk.request(&walk.page(1))).await?;
    if !walk.accept_first(&first)? {
        return Ok(walk.finish());
    }

    match walk.last_page() {
        Some(last) if options.parallel => {
            let requests: Vec<ApiRequest> =
                (2..=last).map(|index| walk.request(&walk.page(index))).collect();
            debug!(
                "Fanning out pages 2..={} of {} with concurrency {}",
                last, path, options.max_concurrency
            );

            match options.on_page_error {
                PageErrorPolicy::Fail => {
                    let responses = client
                        .try_request_many(requests, options.max_concurrency)
                        .await?;
                    for (index, response) in (2..).zip(responses) {
                        walk.accept(index, &response)?;
                    }
                }
                PageErrorPolicy::Skip => {
                    for (position, outcome) in client
                        .request_many(requests, options.max_concurrency)
                        .await
                    {
                        walk.settle(position as u64 + 2, outcome)?;
                    }
                }
            }
        }
        _ => {
            let mut index = 2;
            loop {
                let outcome = client.request(walk.request(&walk.page(index))).await;
                if !walk.settle(index, outcome)? {
                    break;
                }
                index += 1;
            }
        }
    }

    Ok(walk.finish())
}

/// Fetch every page of a listing with the blocking client
///
/// Always sequential. The deadline, if any, is checked before each page.
pub fn fetch_all_blocking(
    client: &mut BlockingApiClient,
    path: &str,
    options: &FetchOptions,
) -> Result<Listing> {
    let started = Instant::now();
    let check_deadline = || match options.deadline {
        Some(deadline) if started.elapsed() >= deadline => Err(deadline_error(deadline)),
        _ => Ok(()),
    };

    let mut walk = PageWalk::new(path, options);

    let first = client.request(walk.request(&walk.page(1)))?;
    let mut more = walk.accept_first(&first)?;

    let mut index = 2;
    while more {
        check_deadline()?;
        let outcome = client.request(walk.request(&walk.page(index)));
        more = walk.settle(index, outcome)?;
        index += 1;
    }

    Ok(walk.finish())
}

/// Cache key for a listing: everything that can change its result
///
/// The deadline is left out: it only decides whether a result exists, and
/// failures are never cached.
pub fn listing_cache_key(settings: &Settings, path: &str, options: &FetchOptions) -> CacheKey {
    let mut key = CacheKey::new(&settings.tenant, format!("list:{path}"))
        .param("base_url", &settings.base_url)
        .param("page_size", options.effective_page_size())
        .param("convention", options.convention.signature())
        .param("items_field", &options.items_field)
        .param("total_field", &options.total_field)
        .param("pages_field", &options.pages_field)
        .param("stop_on_short_page", options.stop_on_short_page)
        .param("max_pages", options.max_pages)
        .param("on_page_error", format!("{:?}", options.on_page_error));
    if let Some(ref unique_key) = options.unique_key {
        key = key.param("unique_key", unique_key);
    }
    key.params(options.query.iter().map(|(k, v)| (format!("q.{k}"), v.clone())))
}

/// [`fetch_all`] through a session cache
///
/// Repeated calls with the same client settings, path and options return the
/// first result without touching the network.
pub async fn fetch_all_cached(
    client: &ApiClient,
    cache: &SessionCache<Listing>,
    path: &str,
    options: &FetchOptions,
) -> Result<Listing> {
    let key = listing_cache_key(client.settings(), path, options);
    cache
        .get_async(key, || fetch_all(client, path, options))
        .await
}
