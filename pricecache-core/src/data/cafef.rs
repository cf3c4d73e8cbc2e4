//! CafeF price-history source.
//!
//! Fetches one page of daily prices per request from CafeF's AJAX history
//! endpoint. The endpoint is an undocumented third-party contract: field
//! names are Vietnamese, numbers sometimes arrive as strings, and an exhausted
//! symbol answers with `"Data": null` instead of an empty list.
//!
//! No retry: any failure goes back to the fetcher, which ends pagination.

use super::provider::{DataError, PageRequest, PageSource, RawRow};
use crate::config::Config;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Date format for the `StartDate` / `EndDate` query parameters.
const QUERY_DATE_FORMAT: &str = "%d/%m/%Y";

/// Outer envelope: `{"Data": {"Data": [...]}}`.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Data", default)]
    data: Option<Table>,
}

#[derive(Debug, Deserialize)]
struct Table {
    #[serde(rename = "Data", default)]
    data: Option<Vec<HistoryRow>>,
}

#[derive(Debug, Deserialize)]
struct HistoryRow {
    #[serde(rename = "Ngay", default)]
    ngay: Value,
    #[serde(rename = "GiaMoCua", default)]
    gia_mo_cua: Value,
    #[serde(rename = "GiaDongCua", default)]
    gia_dong_cua: Value,
    #[serde(rename = "GiaCaoNhat", default)]
    gia_cao_nhat: Value,
    #[serde(rename = "GiaThapNhat", default)]
    gia_thap_nhat: Value,
    #[serde(rename = "KhoiLuongKhopLenh", default)]
    khoi_luong_khop_lenh: Value,
}

impl From<HistoryRow> for RawRow {
    fn from(row: HistoryRow) -> Self {
        RawRow {
            date: row.ngay.as_str().map(str::to_owned),
            open: row.gia_mo_cua,
            close: row.gia_dong_cua,
            high: row.gia_cao_nhat,
            low: row.gia_thap_nhat,
            volume: row.khoi_luong_khop_lenh,
        }
    }
}

/// CafeF price-history page source.
pub struct CafefSource {
    client: reqwest::blocking::Client,
    api_url: String,
}

impl CafefSource {
    pub fn new(
        api_url: impl Into<String>,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
        })
    }

    /// Build a source from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, DataError> {
        Self::new(
            config.api_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
            &config.user_agent,
        )
    }

    /// Query parameters for one page, in the order the endpoint documents them.
    fn query_params(request: &PageRequest<'_>) -> Vec<(&'static str, String)> {
        vec![
            ("Symbol", request.symbol.to_uppercase()),
            ("StartDate", format_query_date(request.start)),
            ("EndDate", format_query_date(request.end)),
            ("PageIndex", request.page_index.to_string()),
            ("PageSize", request.page_size.to_string()),
        ]
    }

    /// Parse a response body into raw rows.
    fn parse_body(body: &str) -> Result<Vec<RawRow>, DataError> {
        let envelope: Envelope = serde_json::from_str(body)
            .map_err(|e| DataError::ResponseFormatChanged(format!("unparseable body: {e}")))?;

        let rows = envelope
            .data
            .and_then(|t| t.data)
            .unwrap_or_default()
            .into_iter()
            .map(RawRow::from)
            .collect();
        Ok(rows)
    }
}

fn format_query_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(QUERY_DATE_FORMAT).to_string())
        .unwrap_or_default()
}

impl PageSource for CafefSource {
    fn name(&self) -> &str {
        "cafef"
    }

    fn fetch_page(&self, request: &PageRequest<'_>) -> Result<Vec<RawRow>, DataError> {
        let resp = self
            .client
            .get(&self.api_url)
            .query(&Self::query_params(request))
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                symbol: request.symbol.to_string(),
                page: request.page_index,
            });
        }

        let body = resp
            .text()
            .map_err(|e| DataError::NetworkUnreachable(format!("failed to read body: {e}")))?;
        Self::parse_body(&body)
    }
}
