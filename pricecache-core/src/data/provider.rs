//! Page source trait and structured error types.
//!
//! The PageSource trait abstracts over where pages of raw rows come from
//! (the CafeF endpoint in production, scripted pages in tests) so the
//! pagination loop can be exercised without a network.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One row exactly as the remote source sent it (before coercion).
///
/// Numeric fields stay as raw JSON values: the source is loose about numbers
/// and the fetcher decides what counts as one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    pub date: Option<String>,
    pub open: Value,
    pub close: Value,
    pub high: Value,
    pub low: Value,
    pub volume: Value,
}

/// Parameters for a single page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest<'a> {
    pub symbol: &'a str,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// 1-based page index.
    pub page_index: usize,
    pub page_size: usize,
}

/// Structured error types for data operations.
///
/// These are designed to be displayable in both CLI and log contexts.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} for {symbol} page {page}")]
    HttpStatus {
        status: u16,
        symbol: String,
        page: usize,
    },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("invalid symbol: '{0}'")]
    InvalidSymbol(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a table of records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSource {
    Cache,
    Remote,
    Unavailable,
}

/// Trait for paginated price-history sources.
///
/// Implementations fetch one page per call and know nothing about the cache
/// or about when pagination should stop.
pub trait PageSource: Send + Sync {
    /// Human-readable name of this source.
    fn name(&self) -> &str;

    /// Fetch one page of raw rows. An empty vector means the source has no
    /// rows for this page.
    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Vec<RawRow>, DataError>;
}
