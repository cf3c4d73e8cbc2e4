//! Runtime configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration pointed at CafeF with a `data_cache/` directory.

use crate::data::fetcher::{FetchRequest, DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE};
use crate::domain::normalize_symbol;
use crate::schedule::parse_daily_time;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str =
    "https://cafef.vn/du-lieu/Ajax/PageNew/DataHistory/PriceHistory.ashx";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_url: String,
    pub cache_dir: PathBuf,
    /// Swept when the cache directory holds no symbols yet.
    pub default_symbol: String,
    pub max_pages: usize,
    pub page_size: usize,
    /// Local wall-clock time of the daily sweep, `HH:MM`.
    pub schedule_time: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            cache_dir: PathBuf::from("data_cache"),
            default_symbol: "HPG".to_string(),
            max_pages: DEFAULT_MAX_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            schedule_time: "17:00".to_string(),
            poll_interval_secs: 30,
            request_timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
        }
    }
}

impl Config {
    /// Load and validate a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `fallback` if it exists, else the defaults.
    pub fn load_or_default(path: Option<&Path>, fallback: &Path) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::from_file(p),
            None if fallback.exists() => Self::from_file(fallback),
            None => Ok(Self::default()),
        }
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid("max_pages must be at least 1".into()));
        }
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be at least 1".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be at least 1".into(),
            ));
        }
        if normalize_symbol(&self.default_symbol).is_none() {
            return Err(ConfigError::Invalid(format!(
                "default_symbol '{}' is not a valid ticker",
                self.default_symbol
            )));
        }
        self.daily_time()?;
        Ok(())
    }

    /// Parsed `schedule_time`.
    pub fn daily_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_daily_time(&self.schedule_time).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Full-history fetch request for `symbol` with this config's page budget.
    pub fn fetch_request(&self, symbol: &str) -> FetchRequest {
        FetchRequest::new(symbol)
            .max_pages(self.max_pages)
            .page_size(self.page_size)
    }
}
