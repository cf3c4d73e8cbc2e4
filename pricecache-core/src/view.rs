//! Presentation boundary: what a chart or table widget needs, and nothing else.
//!
//! The chart is two stacked panels sharing a date axis: prices on top (close
//! always, open/high/low optional) and volume bars underneath. Rendering is
//! left to whatever consumes the serialized [`ChartSpec`].

use crate::domain::PriceRecord;
use chrono::NaiveDateTime;
use serde::Serialize;

/// Display format for table dates.
pub const TABLE_DATE_FORMAT: &str = "%d/%m/%Y";

/// Rows shown in the table view.
pub const DEFAULT_TABLE_ROWS: usize = 120;

/// Which optional series to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeriesToggles {
    pub open: bool,
    pub high: bool,
    pub low: bool,
    pub volume: bool,
}

impl Default for SeriesToggles {
    fn default() -> Self {
        Self {
            open: true,
            high: false,
            low: false,
            volume: true,
        }
    }
}

impl SeriesToggles {
    /// Every series on (what the dashboard shows).
    pub fn all() -> Self {
        Self {
            open: true,
            high: true,
            low: true,
            volume: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Panel {
    Price,
    Volume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    LineMarkers,
    Line,
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dash {
    Solid,
    Dash,
    Dot,
    DashDot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub kind: SeriesKind,
    pub panel: Panel,
    pub color: String,
    pub dash: Dash,
    pub points: Vec<(NaiveDateTime, Option<f64>)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub price_axis: String,
    pub volume_axis: String,
    pub series: Vec<Series>,
}

impl ChartSpec {
    pub fn build(symbol: &str, records: &[PriceRecord], toggles: SeriesToggles) -> Self {
        if records.is_empty() {
            return Self {
                title: "no data".to_string(),
                price_axis: String::new(),
                volume_axis: String::new(),
                series: Vec::new(),
            };
        }

        let mut series = vec![price_line(
            records,
            "Close",
            SeriesKind::LineMarkers,
            "blue",
            Dash::Solid,
            |r| r.close,
        )];
        if toggles.open {
            series.push(price_line(
                records,
                "Open",
                SeriesKind::Line,
                "green",
                Dash::Dash,
                |r| r.open,
            ));
        }
        if toggles.high {
            series.push(price_line(
                records,
                "High",
                SeriesKind::Line,
                "red",
                Dash::Dot,
                |r| r.high,
            ));
        }
        if toggles.low {
            series.push(price_line(
                records,
                "Low",
                SeriesKind::Line,
                "orange",
                Dash::DashDot,
                |r| r.low,
            ));
        }
        if toggles.volume {
            series.push(Series {
                name: "Volume".to_string(),
                kind: SeriesKind::Bar,
                panel: Panel::Volume,
                color: "rgba(128,128,128,0.6)".to_string(),
                dash: Dash::Solid,
                points: records.iter().map(|r| (r.date, r.volume)).collect(),
            });
        }

        Self {
            title: format!("{symbol} - share price"),
            price_axis: "Price (VND)".to_string(),
            volume_axis: "Volume".to_string(),
            series,
        }
    }

    pub fn series_named(&self, name: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.name == name)
    }
}

fn price_line(
    records: &[PriceRecord],
    name: &str,
    kind: SeriesKind,
    color: &str,
    dash: Dash,
    pick: fn(&PriceRecord) -> Option<f64>,
) -> Series {
    Series {
        name: name.to_string(),
        kind,
        panel: Panel::Price,
        color: color.to_string(),
        dash,
        points: records.iter().map(|r| (r.date, pick(r))).collect(),
    }
}

/// One display row of the table view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub date: String,
    pub open: Option<f64>,
    pub close: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub volume: Option<f64>,
}

/// The last `limit` records, with day-first dates.
pub fn table_rows(records: &[PriceRecord], limit: usize) -> Vec<TableRow> {
    let skip = records.len().saturating_sub(limit);
    records[skip..]
        .iter()
        .map(|r| TableRow {
            date: r.date.format(TABLE_DATE_FORMAT).to_string(),
            open: r.open,
            close: r.close,
            high: r.high,
            low: r.low,
            volume: r.volume,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::at_close;
    use chrono::NaiveDate;

    fn records(n: u32) -> Vec<PriceRecord> {
        (1..=n)
            .map(|d| PriceRecord {
                date: at_close(NaiveDate::from_ymd_opt(2024, 3, d).unwrap()),
                open: Some(d as f64),
                close: Some(d as f64 + 0.5),
                high: Some(d as f64 + 1.0),
                low: Some(d as f64 - 1.0),
                volume: Some(1000.0 * d as f64),
            })
            .collect()
    }

    #[test]
    fn default_toggles_show_close_open_volume() {
        let spec = ChartSpec::build("HPG", &records(3), SeriesToggles::default());
        let names: Vec<&str> = spec.series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Close", "Open", "Volume"]);
        assert_eq!(spec.title, "HPG - share price");
        assert_eq!(spec.series_named("Volume").unwrap().panel, Panel::Volume);
        assert_eq!(spec.series_named("Close").unwrap().points.len(), 3);
    }

    #[test]
    fn all_toggles_add_high_low() {
        let spec = ChartSpec::build("HPG", &records(2), SeriesToggles::all());
        assert_eq!(spec.series.len(), 5);
        assert_eq!(spec.series_named("Low").unwrap().dash, Dash::DashDot);
    }

    #[test]
    fn close_is_always_drawn() {
        let toggles = SeriesToggles {
            open: false,
            high: false,
            low: false,
            volume: false,
        };
        let spec = ChartSpec::build("HPG", &records(2), toggles);
        assert_eq!(spec.series.len(), 1);
        assert_eq!(spec.series[0].kind, SeriesKind::LineMarkers);
    }

    #[test]
    fn empty_input_is_no_data_chart() {
        let spec = ChartSpec::build("HPG", &[], SeriesToggles::all());
        assert_eq!(spec.title, "no data");
        assert!(spec.series.is_empty());
    }

    #[test]
    fn spec_serializes_to_json() {
        let spec = ChartSpec::build("HPG", &records(1), SeriesToggles::default());
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["series"][0]["kind"], "line_markers");
        assert_eq!(json["series"][0]["points"][0][0], "2024-03-01T17:00:00");
        assert_eq!(json["series"][0]["points"][0][1], 1.5);
    }

    #[test]
    fn table_keeps_last_rows_with_day_first_dates() {
        let rows = table_rows(&records(5), 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "04/03/2024");
        assert_eq!(rows[1].date, "05/03/2024");
        assert_eq!(table_rows(&records(2), 120).len(), 2);
    }
}
