//! Shared fixtures: a scripted page source and record builders.

#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use pricecache_core::data::{DataError, PageRequest, PageSource, RawRow};
use pricecache_core::domain::{at_close, PriceRecord};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What a scripted page returns.
#[derive(Clone)]
pub enum Page {
    Rows(Vec<RawRow>),
    Fail,
}

/// Page source that replays per-symbol scripts and logs every request.
///
/// Pages past the end of a script come back empty.
#[derive(Default)]
pub struct ScriptedSource {
    scripts: HashMap<String, Vec<Page>>,
    requests: RequestLog,
}

/// Shared record of `(symbol, page_index)` requests, readable after the
/// source has been moved into a fetcher.
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<(String, usize)>>>);

impl RequestLog {
    pub fn pages_for(&self, symbol: &str) -> Vec<usize> {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == symbol)
            .map(|(_, p)| *p)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    fn push(&self, symbol: String, page: usize) {
        self.0.lock().unwrap().push((symbol, page));
    }
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, symbol: &str, pages: Vec<Page>) -> Self {
        self.scripts.insert(symbol.to_uppercase(), pages);
        self
    }

    pub fn log(&self) -> RequestLog {
        self.requests.clone()
    }
}

impl PageSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Vec<RawRow>, DataError> {
        let symbol = request.symbol.to_uppercase();
        self.requests.push(symbol.clone(), request.page_index);

        let page = self
            .scripts
            .get(&symbol)
            .and_then(|pages| pages.get(request.page_index - 1));
        match page {
            Some(Page::Rows(rows)) => Ok(rows.clone()),
            Some(Page::Fail) => Err(DataError::ResponseFormatChanged("scripted failure".into())),
            None => Ok(Vec::new()),
        }
    }
}

pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap() + Duration::days(offset)
}

/// A raw row for `day(offset)`, shaped like the CafeF payload.
pub fn raw_row(offset: i64) -> RawRow {
    let price = 20.0 + offset as f64 * 0.1;
    RawRow {
        date: Some(day(offset).format("%d/%m/%Y").to_string()),
        open: json!(price),
        close: json!(price + 0.2),
        high: json!(price + 0.5),
        low: json!(price - 0.5),
        volume: json!(1_000_000 + offset),
    }
}

/// `count` rows starting at `start`, newest first like the remote source.
pub fn raw_page(start: i64, count: i64) -> Page {
    Page::Rows((start..start + count).rev().map(raw_row).collect())
}

pub fn record(offset: i64) -> PriceRecord {
    let price = 20.0 + offset as f64 * 0.1;
    PriceRecord {
        date: at_close(day(offset)),
        open: Some(price),
        close: Some(price + 0.2),
        high: Some(price + 0.5),
        low: Some(price - 0.5),
        volume: Some(1_000_000.0 + offset as f64),
    }
}

pub fn records(count: i64) -> Vec<PriceRecord> {
    (0..count).map(record).collect()
}
