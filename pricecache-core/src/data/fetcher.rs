//! Pagination loop: page source → raw rows → sorted price records.
//!
//! The loop stops on the first of:
//! - a page error (network, HTTP status, unparseable body),
//! - a page with no rows,
//! - a short page (fewer rows than requested, so nothing follows it),
//! - the page budget running out.
//!
//! Errors and end-of-data stop the loop identically; whatever was collected
//! up to that point is kept.

use super::normalize::normalize_row;
use super::provider::{PageRequest, PageSource, RawRow};
use crate::domain::{sort_by_date, PriceRecord};
use chrono::NaiveDate;
use tracing::{debug, warn};

/// Default number of pages requested per symbol.
pub const DEFAULT_MAX_PAGES: usize = 120;

/// Default number of rows requested per page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// One symbol's fetch parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: String,
    pub max_pages: usize,
    pub page_size: usize,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl FetchRequest {
    /// Full-history request with the default page budget.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            max_pages: DEFAULT_MAX_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            start: None,
            end: None,
        }
    }

    pub fn max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

/// Why pagination ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The source returned a page with no rows.
    Exhausted,
    /// The source returned fewer rows than requested.
    ShortPage,
    /// `max_pages` pages were consumed.
    PageLimit,
    /// A page request failed; the message is the error's display form.
    PageError(String),
}

/// Outcome of one paginated fetch.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub records: Vec<PriceRecord>,
    pub pages: usize,
    pub raw_rows: usize,
    pub dropped_rows: usize,
    pub stop: StopReason,
}

/// Paginating fetcher over any page source.
pub struct Fetcher<S: ?Sized> {
    source: Box<S>,
}

impl<S: PageSource + ?Sized> Fetcher<S> {
    pub fn new(source: Box<S>) -> Self {
        Self { source }
    }

    /// Name of the underlying page source.
    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch and normalize a symbol's history. An empty vector means nothing usable came back.
    pub fn fetch(&self, request: &FetchRequest) -> Vec<PriceRecord> {
        self.fetch_detailed(request).records
    }

    /// Like [`Fetcher::fetch`], but also reports page counts and why pagination stopped.
    pub fn fetch_detailed(&self, request: &FetchRequest) -> FetchOutcome {
        let (raw, pages, stop) = self.collect_pages(request);
        let raw_rows = raw.len();

        let mut records: Vec<PriceRecord> = raw.iter().filter_map(normalize_row).collect();
        let dropped_rows = raw_rows - records.len();
        sort_by_date(&mut records);

        debug!(
            symbol = %request.symbol,
            pages,
            raw_rows,
            dropped_rows,
            kept = records.len(),
            stop = ?stop,
            "fetch finished"
        );

        FetchOutcome {
            records,
            pages,
            raw_rows,
            dropped_rows,
            stop,
        }
    }

    /// Walk pages 1..=max_pages, accumulating raw rows.
    fn collect_pages(&self, request: &FetchRequest) -> (Vec<RawRow>, usize, StopReason) {
        let mut rows: Vec<RawRow> = Vec::new();
        let mut pages = 0;

        if request.page_size == 0 {
            return (rows, pages, StopReason::PageLimit);
        }

        for page_index in 1..=request.max_pages {
            let page_request = PageRequest {
                symbol: &request.symbol,
                start: request.start,
                end: request.end,
                page_index,
                page_size: request.page_size,
            };

            let mut page = match self.source.fetch_page(&page_request) {
                Ok(page) => page,
                Err(e) => {
                    warn!(
                        symbol = %request.symbol,
                        page = page_index,
                        source = self.source.name(),
                        error = %e,
                        "page request failed, stopping pagination"
                    );
                    return (rows, pages, StopReason::PageError(e.to_string()));
                }
            };
            pages += 1;

            if page.is_empty() {
                return (rows, pages, StopReason::Exhausted);
            }

            page.truncate(request.page_size);
            let short = page.len() < request.page_size;
            debug!(symbol = %request.symbol, page = page_index, rows = page.len(), "page received");
            rows.extend(page);

            if short {
                return (rows, pages, StopReason::ShortPage);
            }
        }

        (rows, pages, StopReason::PageLimit)
    }
}
