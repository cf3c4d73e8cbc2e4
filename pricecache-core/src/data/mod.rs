//! Data fetching and caching

pub mod cache;
pub mod cafef;
pub mod fetcher;
pub mod normalize;
pub mod provider;
pub mod sweep;

pub use cache::{CacheStatus, CsvCache, MemoryStore, SymbolStore};
pub use cafef::CafefSource;
pub use fetcher::{FetchOutcome, FetchRequest, Fetcher, StopReason};
pub use provider::{DataError, DataSource, PageRequest, PageSource, RawRow};
pub use sweep::{refresh_all, LogProgress, SweepProgress, SweepSummary, SymbolOutcome};
