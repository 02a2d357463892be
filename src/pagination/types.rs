//! Pagination types
//!
//! Options, page conventions and the aggregate result shared by the async and
//! blocking aggregators.

use crate::types::{JsonValue, QueryParams};
use serde::Serialize;
use std::time::Duration;

/// Query parameter convention used to address a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageConvention {
    /// `?page=N&size=M`
    PageNumber {
        /// Query parameter name for page number
        page_param: String,
        /// Query parameter name for page size
        size_param: String,
        /// Number of the first page (usually 0 or 1)
        first_page: u64,
    },

    /// `?offset=N&limit=M`
    Offset {
        /// Query parameter name for offset
        offset_param: String,
        /// Query parameter name for limit
        limit_param: String,
    },
}

impl Default for PageConvention {
    fn default() -> Self {
        Self::page_number("page", "size", 1)
    }
}

impl PageConvention {
    /// Create a page number convention
    pub fn page_number(
        page_param: impl Into<String>,
        size_param: impl Into<String>,
        first_page: u64,
    ) -> Self {
        Self::PageNumber {
            page_param: page_param.into(),
            size_param: size_param.into(),
            first_page,
        }
    }

    /// Create an offset/limit convention
    pub fn offset(offset_param: impl Into<String>, limit_param: impl Into<String>) -> Self {
        Self::Offset {
            offset_param: offset_param.into(),
            limit_param: limit_param.into(),
        }
    }

    /// Query parameters addressing the 1-based page `index`
    pub fn params(&self, index: u64, page_size: u64) -> QueryParams {
        let position = index.saturating_sub(1);
        match self {
            Self::PageNumber {
                page_param,
                size_param,
                first_page,
            } => vec![
                (page_param.clone(), (first_page + position).to_string()),
                (size_param.clone(), page_size.to_string()),
            ],
            Self::Offset {
                offset_param,
                limit_param,
            } => vec![
                (offset_param.clone(), (position * page_size).to_string()),
                (limit_param.clone(), page_size.to_string()),
            ],
        }
    }

    /// Stable text form used in cache keys
    pub fn signature(&self) -> String {
        match self {
            Self::PageNumber {
                page_param,
                size_param,
                first_page,
            } => format!("page:{page_param}:{size_param}:{first_page}"),
            Self::Offset {
                offset_param,
                limit_param,
            } => format!("offset:{offset_param}:{limit_param}"),
        }
    }
}

/// What to do when a page other than the first fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageErrorPolicy {
    /// Discard everything and return the failing page's error
    #[default]
    Fail,
    /// Keep the other pages and record the failed index
    Skip,
}

/// Size hint read from the first page's envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageHint {
    /// Total number of items across all pages
    pub total_items: Option<u64>,
    /// Total number of pages
    pub total_pages: Option<u64>,
}

impl PageHint {
    /// Build a hint, or `None` when the server reported neither count
    pub fn new(total_items: Option<u64>, total_pages: Option<u64>) -> Option<Self> {
        if total_items.is_none() && total_pages.is_none() {
            None
        } else {
            Some(Self {
                total_items,
                total_pages,
            })
        }
    }

    /// Index of the last page, preferring the reported page count
    pub fn last_page(&self, page_size: u64) -> u64 {
        match (self.total_pages, self.total_items) {
            (Some(pages), _) => pages,
            (None, Some(items)) => items.div_ceil(page_size.max(1)),
            (None, None) => 0,
        }
    }
}

/// One page being fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    /// 1-based page index
    pub index: u64,
    /// Requested page size
    pub size: u64,
    /// Hint taken from page 1, if any
    pub hint: Option<PageHint>,
}

/// Options controlling a multi-page fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Items requested per page
    pub page_size: u64,
    /// Fan out pages 2..N when page 1 carries a hint
    pub parallel: bool,
    /// Maximum pages in flight during fan-out
    pub max_concurrency: usize,
    /// Extra query filters sent with every page
    pub query: QueryParams,
    /// Page addressing convention
    pub convention: PageConvention,
    /// Envelope field holding the items
    pub items_field: String,
    /// Envelope field holding the total item count
    pub total_field: String,
    /// Envelope field holding the total page count
    pub pages_field: String,
    /// Dotted path of a per-item unique key used for dedup
    pub unique_key: Option<String>,
    /// Behaviour when a page fails
    pub on_page_error: PageErrorPolicy,
    /// Treat a page shorter than `page_size` as the last one
    pub stop_on_short_page: bool,
    /// Safety cap on the number of pages walked
    pub max_pages: u64,
    /// Overall time limit for the async aggregate
    pub deadline: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            parallel: false,
            max_concurrency: 4,
            query: Vec::new(),
            convention: PageConvention::default(),
            items_field: "items".to_string(),
            total_field: "total".to_string(),
            pages_field: "pages".to_string(),
            unique_key: None,
            on_page_error: PageErrorPolicy::Fail,
            stop_on_short_page: true,
            max_pages: 10_000,
            deadline: None,
        }
    }
}

impl FetchOptions {
    /// Create options with the given page size
    pub fn new(page_size: u64) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    /// Set page size
    #[must_use]
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Enable parallel fan-out with the given concurrency limit
    #[must_use]
    pub fn parallel(mut self, max_concurrency: usize) -> Self {
        self.parallel = true;
        self.max_concurrency = max_concurrency;
        self
    }

    /// Add a query filter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set the page convention
    #[must_use]
    pub fn convention(mut self, convention: PageConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Set the envelope field names
    #[must_use]
    pub fn fields(
        mut self,
        items: impl Into<String>,
        total: impl Into<String>,
        pages: impl Into<String>,
    ) -> Self {
        self.items_field = items.into();
        self.total_field = total.into();
        self.pages_field = pages.into();
        self
    }

    /// Deduplicate items by a dotted key path
    #[must_use]
    pub fn unique_key(mut self, path: impl Into<String>) -> Self {
        self.unique_key = Some(path.into());
        self
    }

    /// Set the page failure policy
    #[must_use]
    pub fn on_page_error(mut self, policy: PageErrorPolicy) -> Self {
        self.on_page_error = policy;
        self
    }

    /// Enable or disable stopping on a short page
    #[must_use]
    pub fn stop_on_short_page(mut self, stop: bool) -> Self {
        self.stop_on_short_page = stop;
        self
    }

    /// Set the page cap
    #[must_use]
    pub fn max_pages(mut self, max_pages: u64) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Set an overall deadline
    #[must_use]
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Page size used on the wire; zero is treated as one
    pub(crate) fn effective_page_size(&self) -> u64 {
        self.page_size.max(1)
    }
}

/// Every item of a listing, in page order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Listing {
    /// Items in server order, deduplicated when a unique key was given
    pub items: Vec<JsonValue>,
    /// Total item count reported by the server, if any
    pub total: Option<u64>,
    /// Pages that returned successfully
    pub pages_fetched: u64,
    /// Indexes of pages skipped under [`PageErrorPolicy::Skip`]
    pub skipped_pages: Vec<u64>,
}

impl Listing {
    /// Number of items collected
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether no items were collected
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether any page was skipped
    pub fn is_partial(&self) -> bool {
        !self.skipped_pages.is_empty()
    }
}
