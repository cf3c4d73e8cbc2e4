//! PriceCache Core: daily price history fetching, flat-file caching, and scheduled refresh.
//!
//! This crate contains the whole data-refresh pipeline:
//! - Domain types (price records, symbols, date ranges)
//! - Paginated fetcher over a pluggable page source (CafeF in production)
//! - Per-symbol CSV cache behind a key-value store trait
//! - Sequential cache sweep and the once-per-process daily scheduler
//! - Cache-first interactive lookup and the chart/table view model

pub mod config;
pub mod data;
pub mod domain;
pub mod schedule;
pub mod service;
pub mod view;

pub use config::{Config, ConfigError};
pub use domain::{DateRange, PriceRecord};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared with the scheduler thread are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::PriceRecord>();
        require_sync::<domain::PriceRecord>();
        require_send::<domain::DateRange>();
        require_sync::<domain::DateRange>();

        // Data layer
        require_send::<data::Fetcher<dyn data::PageSource>>();
        require_sync::<data::Fetcher<dyn data::PageSource>>();
        require_send::<data::CafefSource>();
        require_sync::<data::CafefSource>();
        require_send::<data::CsvCache>();
        require_sync::<data::CsvCache>();
        require_send::<data::MemoryStore>();
        require_sync::<data::MemoryStore>();
        require_send::<data::DataError>();
        require_sync::<data::DataError>();

        // Scheduler: the queue moves onto the scheduler thread.
        require_send::<schedule::TaskQueue>();
        require_send::<schedule::SchedulerHandle>();

        // Service and config
        require_send::<service::PriceService>();
        require_sync::<service::PriceService>();
        require_send::<config::Config>();
        require_sync::<config::Config>();
    }

    /// Architecture contract: the sweep and the interactive path share the
    /// store only through the `SymbolStore` trait object.
    #[test]
    fn store_trait_is_object_safe() {
        fn _check(store: &dyn data::SymbolStore) -> Vec<String> {
            store.symbols()
        }
        let store = data::MemoryStore::new();
        assert!(_check(&store).is_empty());
    }
}
