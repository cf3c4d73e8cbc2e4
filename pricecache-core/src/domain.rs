//! Domain types: daily price records, symbols, and date ranges.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Hour every record's timestamp is pinned to, marking the end of the trading day.
pub const CLOSE_HOUR: u32 = 17;

/// One trading day of one symbol.
///
/// Every numeric field is optional: a value the source sent that could not be
/// coerced to a number is kept as `None` rather than failing the whole row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub date: NaiveDateTime,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

impl PriceRecord {
    /// Calendar day of this record.
    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }
}

/// Pin a calendar day to `CLOSE_HOUR:00:00`.
pub fn at_close(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::from_hms_opt(CLOSE_HOUR, 0, 0).unwrap_or(NaiveTime::MIN))
}

/// Canonical form of a ticker: trimmed and uppercased.
///
/// Returns `None` when nothing is left after trimming, or when the ticker is
/// not usable as a file stem: only `[A-Z0-9._-]` is allowed and `..` is
/// rejected.
pub fn normalize_symbol(symbol: &str) -> Option<String> {
    let upper = symbol.trim().to_uppercase();
    let valid = !upper.is_empty()
        && !upper.starts_with('.')
        && !upper.contains("..")
        && upper.chars().all(is_symbol_char);
    valid.then_some(upper)
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-')
}

/// Stable ascending sort by date. Records sharing a date keep their input order.
pub fn sort_by_date(records: &mut [PriceRecord]) {
    records.sort_by_key(|r| r.date);
}

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    /// From `today - days` through `today`, both ends included (`days + 1`
    /// calendar days).
    pub fn trailing_days(today: NaiveDate, days: i64) -> Self {
        Self {
            from: today - chrono::Duration::days(days),
            to: today,
        }
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.from <= day && day <= self.to
    }
}

/// Records whose calendar day lies inside `range`, in their original order.
pub fn filter_range(records: &[PriceRecord], range: DateRange) -> Vec<PriceRecord> {
    records
        .iter()
        .filter(|r| range.contains(r.day()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(y: i32, m: u32, d: u32) -> PriceRecord {
        PriceRecord {
            date: at_close(NaiveDate::from_ymd_opt(y, m, d).unwrap()),
            open: Some(1.0),
            close: Some(1.0),
            high: Some(1.0),
            low: Some(1.0),
            volume: Some(10.0),
        }
    }

    #[test]
    fn at_close_pins_hour() {
        let dt = at_close(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(dt.to_string(), "2024-03-01 17:00:00");
    }

    #[test]
    fn symbol_is_trimmed_and_uppercased() {
        assert_eq!(normalize_symbol("  hpg "), Some("HPG".to_string()));
        assert_eq!(normalize_symbol("   "), None);
        assert_eq!(normalize_symbol(""), None);
        assert_eq!(normalize_symbol("e1vfvn30"), Some("E1VFVN30".to_string()));
        assert_eq!(normalize_symbol("brk.b"), Some("BRK.B".to_string()));
    }

    #[test]
    fn path_like_symbols_are_rejected() {
        let bad = [
            "../x", "..", ".", ".hidden", "a/b", "a\\b", "HPG..", "h p g", "hpg!", "/etc",
        ];
        for bad in bad {
            assert_eq!(normalize_symbol(bad), None, "{bad:?} should be rejected");
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let records = vec![record(2024, 1, 1), record(2024, 1, 2), record(2024, 1, 3)];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        );
        let out = filter_range(&records, range);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].day(), NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    }

    #[test]
    fn inverted_range_is_empty() {
        let records = vec![record(2024, 1, 1), record(2024, 1, 2)];
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(filter_range(&records, range).is_empty());
    }

    #[test]
    fn sort_is_stable() {
        let mut a = record(2024, 1, 2);
        a.open = Some(5.0);
        let mut b = record(2024, 1, 2);
        b.open = Some(6.0);
        let mut records = vec![a, record(2024, 1, 1), b];
        sort_by_date(&mut records);
        assert_eq!(records[0].day(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(records[1].open, Some(5.0));
        assert_eq!(records[2].open, Some(6.0));
    }

    #[test]
    fn trailing_days_spans_back_from_today() {
        let today = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let range = DateRange::trailing_days(today, 365);
        assert_eq!(range.from, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(range.to, today);

        let month = DateRange::trailing_days(today, 30);
        assert_eq!((month.to - month.from).num_days() + 1, 31);
    }
}
