//! Cache sweep: refetch every cached symbol and replace its table.

use super::cache::SymbolStore;
use super::fetcher::{FetchRequest, Fetcher};
use super::provider::{DataError, PageSource};
use std::panic::{self, AssertUnwindSafe};
use tracing::{info, warn};

/// Outcome of refreshing one symbol.
#[derive(Debug)]
pub enum SymbolOutcome {
    /// New table written; carries its row count.
    Refreshed(usize),
    /// The source had nothing; the old table was left alone.
    Empty,
    /// Storing failed, or the refresh panicked.
    Failed(DataError),
}

/// Progress callback for a sweep.
pub trait SweepProgress: Send + Sync {
    /// Called when starting to refresh a symbol.
    fn on_start(&self, symbol: &str, index: usize, total: usize);

    /// Called when a symbol refresh completes.
    fn on_complete(&self, symbol: &str, index: usize, total: usize, outcome: &SymbolOutcome);

    /// Called when the entire sweep is done.
    fn on_sweep_complete(&self, summary: &SweepSummary);
}

/// Reports sweep progress through the log.
pub struct LogProgress;

impl SweepProgress for LogProgress {
    fn on_start(&self, symbol: &str, index: usize, total: usize) {
        info!("[{}/{}] refreshing {symbol}", index + 1, total);
    }

    fn on_complete(&self, symbol: &str, _index: usize, _total: usize, outcome: &SymbolOutcome) {
        match outcome {
            SymbolOutcome::Refreshed(rows) => info!(symbol, rows, "refreshed"),
            SymbolOutcome::Empty => warn!(symbol, "no data returned, cache left unchanged"),
            SymbolOutcome::Failed(e) => warn!(symbol, error = %e, "refresh failed"),
        }
    }

    fn on_sweep_complete(&self, summary: &SweepSummary) {
        info!(
            total = summary.total,
            refreshed = summary.refreshed,
            empty = summary.empty,
            failed = summary.failed,
            "sweep complete"
        );
    }
}

/// Summary of a sweep.
#[derive(Debug, Default)]
pub struct SweepSummary {
    pub total: usize,
    pub refreshed: usize,
    pub empty: usize,
    pub failed: usize,
    pub errors: Vec<(String, DataError)>,
}

impl SweepSummary {
    pub fn all_refreshed(&self) -> bool {
        self.refreshed == self.total
    }
}

/// Which symbols a sweep covers: everything cached, or the default symbol
/// when the cache is still empty.
pub fn sweep_symbols(store: &dyn SymbolStore, default_symbol: &str) -> Vec<String> {
    let symbols = store.symbols();
    if symbols.is_empty() {
        vec![default_symbol.trim().to_uppercase()]
    } else {
        symbols
    }
}

/// Refresh every known symbol, one at a time.
///
/// `template` supplies the page budget and date bounds; its symbol is
/// replaced per symbol. One symbol's failure never stops the sweep.
pub fn refresh_all<S: PageSource + ?Sized>(
    fetcher: &Fetcher<S>,
    store: &dyn SymbolStore,
    default_symbol: &str,
    template: &FetchRequest,
    progress: &dyn SweepProgress,
) -> SweepSummary {
    let symbols = sweep_symbols(store, default_symbol);
    let total = symbols.len();
    let mut summary = SweepSummary {
        total,
        ..SweepSummary::default()
    };

    for (i, symbol) in symbols.iter().enumerate() {
        progress.on_start(symbol, i, total);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            refresh_single(fetcher, store, symbol, template)
        }))
        .unwrap_or_else(|payload| {
            SymbolOutcome::Failed(DataError::Other(format!(
                "refresh panicked: {}",
                panic_message(payload.as_ref())
            )))
        });
        progress.on_complete(symbol, i, total, &outcome);

        match outcome {
            SymbolOutcome::Refreshed(_) => summary.refreshed += 1,
            SymbolOutcome::Empty => summary.empty += 1,
            SymbolOutcome::Failed(e) => {
                summary.failed += 1;
                summary.errors.push((symbol.clone(), e));
            }
        }
    }

    progress.on_sweep_complete(&summary);
    summary
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Refresh a single symbol: fetch → replace.
fn refresh_single<S: PageSource + ?Sized>(
    fetcher: &Fetcher<S>,
    store: &dyn SymbolStore,
    symbol: &str,
    template: &FetchRequest,
) -> SymbolOutcome {
    let request = FetchRequest {
        symbol: symbol.to_string(),
        ..template.clone()
    };
    let records = fetcher.fetch(&request);
    if records.is_empty() {
        return SymbolOutcome::Empty;
    }

    let rows = records.len();
    match store.put(symbol, &records) {
        Ok(()) => SymbolOutcome::Refreshed(rows),
        Err(e) => SymbolOutcome::Failed(e),
    }
}
