//! Row normalization: date parsing and numeric coercion.

use super::provider::RawRow;
use crate::domain::{at_close, PriceRecord};
use chrono::NaiveDate;
use serde_json::Value;

/// Date format used by the remote source.
pub const SOURCE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Parse a source date and pin it to the close hour.
pub fn parse_source_date(raw: &str) -> Option<chrono::NaiveDateTime> {
    NaiveDate::parse_from_str(raw.trim(), SOURCE_DATE_FORMAT)
        .ok()
        .map(at_close)
}

/// Coerce a loosely typed JSON value to a finite number.
///
/// Numbers pass through, strings are parsed after trimming, and everything
/// else (null, bools, objects, unparseable text, NaN/inf) becomes `None`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Convert a raw row into a record. Rows without a parseable date are dropped.
pub fn normalize_row(row: &RawRow) -> Option<PriceRecord> {
    let date = row.date.as_deref().and_then(parse_source_date)?;
    Some(PriceRecord {
        date,
        open: coerce_number(&row.open),
        close: coerce_number(&row.close),
        high: coerce_number(&row.high),
        low: coerce_number(&row.low),
        volume: coerce_number(&row.volume),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_day_month_year() {
        let dt = parse_source_date("05/03/2024").unwrap();
        assert_eq!(dt.to_string(), "2024-03-05 17:00:00");
    }

    #[test]
    fn rejects_other_date_shapes() {
        assert!(parse_source_date("2024-03-05").is_none());
        assert!(parse_source_date("31/02/2024").is_none());
        assert!(parse_source_date("").is_none());
    }

    #[test]
    fn coerces_numbers_and_numeric_strings() {
        assert_eq!(coerce_number(&json!(12.5)), Some(12.5));
        assert_eq!(coerce_number(&json!(1200)), Some(1200.0));
        assert_eq!(coerce_number(&json!(" 3.25 ")), Some(3.25));
    }

    #[test]
    fn coercion_failure_is_missing() {
        assert_eq!(coerce_number(&json!("n/a")), None);
        assert_eq!(coerce_number(&json!(null)), None);
        assert_eq!(coerce_number(&json!(true)), None);
        assert_eq!(coerce_number(&json!("NaN")), None);
        assert_eq!(coerce_number(&json!({"v": 1})), None);
    }

    #[test]
    fn bad_number_does_not_drop_row() {
        let row = RawRow {
            date: Some("02/01/2024".into()),
            open: json!("oops"),
            close: json!(25.1),
            high: json!(25.5),
            low: json!(24.9),
            volume: json!(1000),
        };
        let rec = normalize_row(&row).unwrap();
        assert_eq!(rec.open, None);
        assert_eq!(rec.close, Some(25.1));
        assert_eq!(rec.volume, Some(1000.0));
    }

    #[test]
    fn bad_date_drops_row() {
        let row = RawRow {
            date: Some("not a date".into()),
            close: json!(1.0),
            ..RawRow::default()
        };
        assert!(normalize_row(&row).is_none());

        let missing = RawRow {
            date: None,
            ..RawRow::default()
        };
        assert!(normalize_row(&missing).is_none());
    }
}
