//! Interactive request path: cache-first lookup with a fetch on miss.
//!
//! This is what a dashboard calls when the user asks for a symbol. It never
//! returns an error: the worst case is an empty table plus a [`Notice`]
//! explaining why.

use crate::data::cache::SymbolStore;
use crate::data::fetcher::{FetchRequest, Fetcher};
use crate::data::provider::{DataSource, PageSource};
use crate::domain::{filter_range, normalize_symbol, DateRange, PriceRecord};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Records for one symbol and where they came from.
#[derive(Debug, Clone)]
pub struct Lookup {
    pub records: Vec<PriceRecord>,
    pub source: DataSource,
}

/// User-facing outcome of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// `rows` records fall inside the requested range.
    Loaded { rows: usize },
    /// The symbol has data, none of it inside the range.
    EmptyRange,
    /// Neither the cache nor the remote source had anything.
    NoData,
    /// The symbol was blank.
    InvalidSymbol,
}

impl Notice {
    /// Whether the notice should be shown as an error rather than info.
    pub fn is_error(&self) -> bool {
        matches!(self, Notice::NoData | Notice::InvalidSymbol)
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Loaded { rows } => write!(f, "showing {rows} rows"),
            Notice::EmptyRange => write!(f, "no data in the selected date range"),
            Notice::NoData => write!(f, "could not load any data"),
            Notice::InvalidSymbol => write!(f, "enter a ticker symbol"),
        }
    }
}

/// Result of a ranged query.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub symbol: String,
    pub records: Vec<PriceRecord>,
    pub source: DataSource,
    pub notice: Notice,
}

/// Cache-first price service shared with the background sweep.
pub struct PriceService {
    store: Arc<dyn SymbolStore>,
    fetcher: Arc<Fetcher<dyn PageSource>>,
    template: FetchRequest,
}

impl PriceService {
    /// `template` carries the page budget used for cache-miss fetches.
    pub fn new(
        store: Arc<dyn SymbolStore>,
        fetcher: Arc<Fetcher<dyn PageSource>>,
        template: FetchRequest,
    ) -> Self {
        Self {
            store,
            fetcher,
            template,
        }
    }

    /// Cached records if any, else a fresh fetch (stored when non-empty).
    pub fn load_or_fetch(&self, symbol: &str) -> Lookup {
        let cached = self.store.get(symbol);
        if !cached.is_empty() {
            return Lookup {
                records: cached,
                source: DataSource::Cache,
            };
        }

        info!(symbol, source = self.fetcher.source_name(), "cache miss, fetching");
        let request = FetchRequest {
            symbol: symbol.to_string(),
            ..self.template.clone()
        };
        let records = self.fetcher.fetch(&request);
        if records.is_empty() {
            return Lookup {
                records,
                source: DataSource::Unavailable,
            };
        }

        if let Err(e) = self.store.put(symbol, &records) {
            warn!(symbol, error = %e, "fetched data could not be cached");
        }
        Lookup {
            records,
            source: DataSource::Remote,
        }
    }

    /// Records for `symbol` inside `range`, with a notice for the user.
    pub fn query(&self, symbol: &str, range: DateRange) -> QueryOutcome {
        let Some(symbol) = normalize_symbol(symbol) else {
            return QueryOutcome {
                symbol: String::new(),
                records: Vec::new(),
                source: DataSource::Unavailable,
                notice: Notice::InvalidSymbol,
            };
        };

        let lookup = self.load_or_fetch(&symbol);
        if lookup.records.is_empty() {
            return QueryOutcome {
                symbol,
                records: Vec::new(),
                source: lookup.source,
                notice: Notice::NoData,
            };
        }

        let records = filter_range(&lookup.records, range);
        let notice = if records.is_empty() {
            Notice::EmptyRange
        } else {
            Notice::Loaded {
                rows: records.len(),
            }
        };

        QueryOutcome {
            symbol,
            records,
            source: lookup.source,
            notice,
        }
    }
}
