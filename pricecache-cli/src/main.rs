//! PriceCache CLI - show, refresh, daemon, and cache status commands.
//!
//! Commands:
//! - `show` - load a symbol (cache first, fetch on miss) and print a table or chart spec
//! - `refresh` - run one cache sweep now
//! - `daemon` - start the daily sweep scheduler and block on it
//! - `status` - report cached symbols, row counts, and date spans

mod logging;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pricecache_core::data::{
    refresh_all, CafefSource, CsvCache, Fetcher, LogProgress, PageSource, SymbolStore,
};
use pricecache_core::domain::DateRange;
use pricecache_core::schedule::{daily_refresh_queue, Scheduler};
use pricecache_core::service::PriceService;
use pricecache_core::view::{table_rows, ChartSpec, SeriesToggles, DEFAULT_TABLE_ROWS};
use pricecache_core::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

/// Config file picked up from the working directory when `--config` is absent.
const DEFAULT_CONFIG_FILE: &str = "pricecache.toml";

#[derive(Parser)]
#[command(
    name = "pricecache",
    about = "PriceCache - daily stock price history with a local flat-file cache"
)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./pricecache.toml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show price history for a symbol, fetching it if not cached.
    Show {
        /// Ticker symbol (e.g., HPG, VNM, FPT).
        symbol: String,

        /// Start date (YYYY-MM-DD). Defaults to 365 days ago.
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        to: Option<String>,

        /// Hide the opening-price series.
        #[arg(long, default_value_t = false)]
        no_open: bool,

        /// Hide the daily-high series.
        #[arg(long, default_value_t = false)]
        no_high: bool,

        /// Hide the daily-low series.
        #[arg(long, default_value_t = false)]
        no_low: bool,

        /// Hide the volume bars.
        #[arg(long, default_value_t = false)]
        no_volume: bool,

        /// Print the chart spec as JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Number of most recent rows to print.
        #[arg(long, default_value_t = DEFAULT_TABLE_ROWS)]
        rows: usize,
    },
    /// Refetch every cached symbol now.
    Refresh,
    /// Run the daily refresh scheduler until the process is stopped.
    Daemon,
    /// Report cached symbols, row counts, and date spans.
    Status,
}

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    let config = Config::load_or_default(cli.config.as_deref(), Path::new(DEFAULT_CONFIG_FILE))
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Show {
            symbol,
            from,
            to,
            no_open,
            no_high,
            no_low,
            no_volume,
            json,
            rows,
        } => {
            let toggles = SeriesToggles {
                open: !no_open,
                high: !no_high,
                low: !no_low,
                volume: !no_volume,
            };
            run_show(&config, &symbol, from, to, toggles, json, rows)
        }
        Commands::Refresh => run_refresh(&config),
        Commands::Daemon => run_daemon(&config),
        Commands::Status => run_status(&config),
    }
}

fn build_fetcher(config: &Config) -> Result<Arc<Fetcher<dyn PageSource>>> {
    let source: Box<dyn PageSource> =
        Box::new(CafefSource::from_config(config).context("failed to build HTTP client")?);
    Ok(Arc::new(Fetcher::new(source)))
}

fn parse_date(raw: Option<&str>, flag: &str) -> Result<Option<NaiveDate>> {
    raw.map(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d"))
        .transpose()
        .with_context(|| format!("{flag} must be YYYY-MM-DD"))
}

fn run_show(
    config: &Config,
    symbol: &str,
    from: Option<String>,
    to: Option<String>,
    toggles: SeriesToggles,
    json: bool,
    rows: usize,
) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let default_range = DateRange::trailing_days(today, 365);
    let range = DateRange::new(
        parse_date(from.as_deref(), "--from")?.unwrap_or(default_range.from),
        parse_date(to.as_deref(), "--to")?.unwrap_or(today),
    );

    let store: Arc<dyn SymbolStore> = Arc::new(CsvCache::new(&config.cache_dir));
    let service = PriceService::new(
        store,
        build_fetcher(config)?,
        config.fetch_request(&config.default_symbol),
    );

    let outcome = service.query(symbol, range);
    if outcome.notice.is_error() {
        eprintln!("Error: {}", outcome.notice);
    } else {
        eprintln!("{} ({}, {:?})", outcome.notice, outcome.symbol, outcome.source);
    }

    if json {
        let spec = ChartSpec::build(&outcome.symbol, &outcome.records, toggles);
        println!("{}", serde_json::to_string_pretty(&spec)?);
        return Ok(());
    }

    if outcome.records.is_empty() {
        return Ok(());
    }

    println!(
        "{:<12} {:>12} {:>12} {:>12} {:>12} {:>16}",
        "Date", "Open", "Close", "High", "Low", "Volume"
    );
    for row in table_rows(&outcome.records, rows) {
        println!(
            "{:<12} {:>12} {:>12} {:>12} {:>12} {:>16}",
            row.date,
            fmt_num(row.open, 2),
            fmt_num(row.close, 2),
            fmt_num(row.high, 2),
            fmt_num(row.low, 2),
            fmt_num(row.volume, 0),
        );
    }
    Ok(())
}

fn fmt_num(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{v:.decimals$}"),
        None => "-".to_string(),
    }
}

fn run_refresh(config: &Config) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let store = CsvCache::new(&config.cache_dir);
    let template = config.fetch_request(&config.default_symbol);

    let summary = refresh_all(
        fetcher.as_ref(),
        &store,
        &config.default_symbol,
        &template,
        &LogProgress,
    );

    println!(
        "Refresh complete: {}/{} refreshed, {} empty, {} failed",
        summary.refreshed, summary.total, summary.empty, summary.failed
    );
    for (sym, err) in &summary.errors {
        eprintln!("Error for {sym}: {err}");
    }
    Ok(())
}

fn run_daemon(config: &Config) -> Result<()> {
    let fetcher = build_fetcher(config)?;
    let store: Arc<dyn SymbolStore> = Arc::new(CsvCache::new(&config.cache_dir));
    let now = chrono::Local::now().naive_local();

    let queue = daily_refresh_queue(config, fetcher, store, now)?;
    for (name, at) in queue.upcoming() {
        info!(job = %name, next_run = %at, "scheduled");
    }

    let handle = Scheduler::start(queue, config.poll_interval())?;
    handle.join()?;
    Ok(())
}

fn run_status(config: &Config) -> Result<()> {
    let cache = CsvCache::new(&config.cache_dir);
    let status = cache.status();

    if status.is_empty() {
        println!("No cached symbols in {}", cache.cache_dir().display());
        return Ok(());
    }

    println!("Cache: {}", cache.cache_dir().display());
    println!("{:<10} {:>8} {:>12} {:>12}", "Symbol", "Rows", "First", "Last");
    for s in status {
        let fmt_day = |d: Option<chrono::NaiveDateTime>| {
            d.map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "{:<10} {:>8} {:>12} {:>12}",
            s.symbol,
            s.rows,
            fmt_day(s.first),
            fmt_day(s.last)
        );
    }
    Ok(())
}
