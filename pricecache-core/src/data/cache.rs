//! Flat-file cache: one CSV per symbol.
//!
//! Layout: `{cache_dir}/{SYMBOL}.csv`
//!
//! - Writes replace the whole file (write to `.tmp`, rename into place).
//! - Reads never fail: a missing, unreadable or unparseable file reads as an
//!   empty table and the problem is logged.
//! - Column headers are the dashboard's Vietnamese labels so the files open
//!   directly in a spreadsheet.

use super::provider::DataError;
use crate::domain::{normalize_symbol, sort_by_date, PriceRecord};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// Column headers, in file order.
pub const HEADERS: [&str; 6] = [
    "Ngày",
    "Mở cửa",
    "Đóng cửa",
    "Cao nhất",
    "Thấp nhất",
    "Khối lượng",
];

const WRITE_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const READ_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Keyed storage of per-symbol price tables.
///
/// Symbols are matched case-insensitively. `put` replaces whatever was stored
/// for the symbol; there is no merging.
pub trait SymbolStore: Send + Sync {
    /// Cached records for a symbol, sorted by date. Empty when nothing usable is stored.
    fn get(&self, symbol: &str) -> Vec<PriceRecord>;

    /// Replace the stored records for a symbol.
    fn put(&self, symbol: &str, records: &[PriceRecord]) -> Result<(), DataError>;

    /// Uppercased symbols that currently have an entry, sorted.
    fn symbols(&self) -> Vec<String>;
}

/// One CSV line.
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Ngày")]
    date: String,
    #[serde(rename = "Mở cửa")]
    open: Option<f64>,
    #[serde(rename = "Đóng cửa")]
    close: Option<f64>,
    #[serde(rename = "Cao nhất")]
    high: Option<f64>,
    #[serde(rename = "Thấp nhất")]
    low: Option<f64>,
    #[serde(rename = "Khối lượng")]
    volume: Option<f64>,
}

impl From<&PriceRecord> for CsvRow {
    fn from(r: &PriceRecord) -> Self {
        CsvRow {
            date: r.date.format(WRITE_DATE_FORMAT).to_string(),
            open: r.open,
            close: r.close,
            high: r.high,
            low: r.low,
            volume: r.volume,
        }
    }
}

impl CsvRow {
    fn into_record(self) -> Result<PriceRecord, DataError> {
        let date = parse_cached_date(&self.date)
            .ok_or_else(|| DataError::CacheError(format!("bad date '{}'", self.date)))?;
        Ok(PriceRecord {
            date,
            open: self.open,
            close: self.close,
            high: self.high,
            low: self.low,
            volume: self.volume,
        })
    }
}

/// Accept the formats this cache (or a spreadsheet round-trip) may have produced.
fn parse_cached_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    READ_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

/// `.tmp` sibling of a cache file, removed on drop unless renamed into place.
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl TempFile {
    fn beside(target: &Path) -> Self {
        Self {
            path: target.with_extension("csv.tmp"),
            persisted: false,
        }
    }

    fn persist(mut self, target: &Path) -> std::io::Result<()> {
        fs::rename(&self.path, target)?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.persisted {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn write_rows(path: &Path, records: &[PriceRecord]) -> Result<(), DataError> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(CsvRow::from(record))?;
    }
    writer.flush()?;
    Ok(())
}

/// The CSV directory cache.
pub struct CsvCache {
    cache_dir: PathBuf,
}

impl CsvCache {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path to a symbol's file: `{cache_dir}/{SYMBOL}.csv`
    pub fn path_for(&self, symbol: &str) -> Result<PathBuf, DataError> {
        let sym =
            normalize_symbol(symbol).ok_or_else(|| DataError::InvalidSymbol(symbol.to_string()))?;
        Ok(self.cache_dir.join(format!("{sym}.csv")))
    }

    /// Load a symbol's file, surfacing every failure.
    ///
    /// `Ok(None)` means no file exists. [`SymbolStore::get`] is the
    /// forgiving wrapper used by the rest of the system.
    pub fn load(&self, symbol: &str) -> Result<Option<Vec<PriceRecord>>, DataError> {
        let path = self.path_for(symbol)?;
        if !path.exists() {
            return Ok(None);
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&path)?;

        let mut records = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            records.push(row?.into_record()?);
        }

        sort_by_date(&mut records);
        Ok(Some(records))
    }

    /// Write a symbol's file, replacing any previous content.
    ///
    /// Writes are atomic: write to .tmp then rename.
    pub fn write(&self, symbol: &str, records: &[PriceRecord]) -> Result<(), DataError> {
        if records.is_empty() {
            return Err(DataError::CacheError("no records to cache".into()));
        }

        let path = self.path_for(symbol)?;
        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let tmp = TempFile::beside(&path);
        write_rows(&tmp.path, records)?;
        tmp.persist(&path)
            .map_err(|e| DataError::CacheError(format!("atomic rename failed: {e}")))?;

        Ok(())
    }

    /// Row count and date span per cached symbol.
    pub fn status(&self) -> Vec<CacheStatus> {
        self.symbols()
            .into_iter()
            .map(|symbol| {
                let records = self.get(&symbol);
                CacheStatus {
                    rows: records.len(),
                    first: records.first().map(|r| r.date),
                    last: records.last().map(|r| r.date),
                    symbol,
                }
            })
            .collect()
    }
}

impl SymbolStore for CsvCache {
    fn get(&self, symbol: &str) -> Vec<PriceRecord> {
        match self.load(symbol) {
            Ok(Some(records)) => records,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(symbol, error = %e, "unreadable cache file, treating as empty");
                Vec::new()
            }
        }
    }

    fn put(&self, symbol: &str, records: &[PriceRecord]) -> Result<(), DataError> {
        self.write(symbol, records)
    }

    fn symbols(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut symbols: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("csv"))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(normalize_symbol)
            })
            .collect();
        symbols.sort();
        symbols.dedup();
        symbols
    }
}

/// Cache status for a single symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStatus {
    pub symbol: String,
    pub rows: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
}

/// In-process store with the same replace-on-put semantics as [`CsvCache`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Vec<PriceRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SymbolStore for MemoryStore {
    fn get(&self, symbol: &str) -> Vec<PriceRecord> {
        let Some(sym) = normalize_symbol(symbol) else {
            return Vec::new();
        };
        let tables = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut records = tables.get(&sym).cloned().unwrap_or_default();
        sort_by_date(&mut records);
        records
    }

    fn put(&self, symbol: &str, records: &[PriceRecord]) -> Result<(), DataError> {
        if records.is_empty() {
            return Err(DataError::CacheError("no records to cache".into()));
        }
        let sym =
            normalize_symbol(symbol).ok_or_else(|| DataError::InvalidSymbol(symbol.to_string()))?;
        let mut tables = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tables.insert(sym, records.to_vec());
        Ok(())
    }

    fn symbols(&self) -> Vec<String> {
        let tables = match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tables.keys().cloned().collect()
    }
}
