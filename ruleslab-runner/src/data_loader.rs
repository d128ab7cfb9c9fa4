//! Candle loading, resampling and cleaning for the runner.
//!
//! Source data is Binance-style kline CSV, one file per month:
//! `{SYMBOL}-{interval}-{YYYY-MM}.csv` with 12 unnamed columns
//! (open_time, open, high, low, close, volume, close_time, ...). Only the
//! first six are read. Missing months are skipped with a warning; loading
//! fails only if no month yields data.
//!
//! Synthetic data is a developer-only mode. Results produced on synthetic
//! bars are tagged as such.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use ruleslab_core::domain::Bar;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{path}, row {row}: {reason}")]
    Malformed {
        path: PathBuf,
        row: usize,
        reason: String,
    },

    #[error("no candle files for {symbol} {interval} from {start} to {end} under {dir}")]
    NoData {
        dir: PathBuf,
        symbol: String,
        interval: String,
        start: YearMonth,
        end: YearMonth,
    },

    #[error("invalid month '{0}' (expected YYYY-MM)")]
    InvalidMonth(String),

    #[error("invalid frequency '{0}' (expected e.g. 1min, 15min, 1h, 4h, 1d)")]
    InvalidFrequency(String),

    #[error("start month {start} is after end month {end}")]
    EmptyRange { start: YearMonth, end: YearMonth },
}

// ── Months ──

/// A calendar month, parsed from `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn next(self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// Midnight on the first day of the month.
    pub fn start(self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).and_then(|d| d.and_hms_opt(0, 0, 0))
    }

    /// Every month from `start` through `end`, inclusive.
    pub fn range(start: Self, end: Self) -> Vec<Self> {
        let mut months = Vec::new();
        let mut m = start;
        while m <= end {
            months.push(m);
            m = m.next();
        }
        months
    }
}

impl FromStr for YearMonth {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || LoadError::InvalidMonth(s.to_string());
        let (y, m) = s.trim().split_once('-').ok_or_else(bad)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(bad());
        }
        let year = y.parse().map_err(|_| bad())?;
        let month = m.parse().map_err(|_| bad())?;
        Self::new(year, month).ok_or_else(bad)
    }
}

impl TryFrom<String> for YearMonth {
    type Error = LoadError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<YearMonth> for String {
    fn from(m: YearMonth) -> Self {
        m.to_string()
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

// ── Frequency ──

/// A fixed resampling period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Frequency {
    seconds: i64,
}

impl Frequency {
    /// `None` unless `seconds` is positive and fits a `chrono::Duration`.
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        (seconds > 0 && Duration::try_seconds(seconds).is_some()).then_some(Self { seconds })
    }

    pub fn hourly() -> Self {
        Self { seconds: 3_600 }
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn duration(&self) -> Duration {
        // in range: checked by from_seconds
        Duration::seconds(self.seconds)
    }

    /// Start of the bucket containing `ts`, aligned to the Unix epoch.
    pub fn floor(&self, ts: NaiveDateTime) -> NaiveDateTime {
        let secs = ts.and_utc().timestamp();
        let floored = secs - secs.rem_euclid(self.seconds);
        ts - Duration::seconds(secs - floored)
    }
}

impl FromStr for Frequency {
    type Err = LoadError;

    /// Accepts `<n><unit>` with unit one of `s`, `min`/`m`/`T`, `h`/`H`, `d`/`D`.
    /// A missing count means 1 (`"h"` = one hour).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || LoadError::InvalidFrequency(s.to_string());
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(bad)?;
        let (count, unit) = trimmed.split_at(split);
        let count: i64 = if count.is_empty() {
            1
        } else {
            count.parse().map_err(|_| bad())?
        };
        let unit_secs = match unit {
            "s" | "S" => 1,
            "min" | "m" | "T" => 60,
            "h" | "H" => 3_600,
            "d" | "D" => 86_400,
            _ => return Err(bad()),
        };
        count
            .checked_mul(unit_secs)
            .and_then(Self::from_seconds)
            .ok_or_else(bad)
    }
}

impl TryFrom<String> for Frequency {
    type Error = LoadError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Frequency> for String {
    fn from(f: Frequency) -> Self {
        f.to_string()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}min", s / 60)
        } else {
            write!(f, "{s}s")
        }
    }
}

// ── Timestamps ──

/// Interpret a numeric epoch whose unit is inferred from its magnitude:
/// >= 1e18 ns, >= 1e15 µs, >= 1e12 ms, otherwise seconds.
pub fn epoch_to_datetime(value: f64) -> Option<NaiveDateTime> {
    if !value.is_finite() {
        return None;
    }
    let millis = if value >= 1e18 {
        value / 1e6
    } else if value >= 1e15 {
        value / 1e3
    } else if value >= 1e12 {
        value
    } else {
        value * 1e3
    };
    DateTime::from_timestamp_millis(millis.round() as i64).map(|dt| dt.naive_utc())
}

/// Parse a timestamp cell: a numeric epoch, RFC 3339, or `%Y-%m-%d %H:%M:%S`.
pub fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let cell = cell.trim();
    if let Ok(v) = cell.parse::<f64>() {
        return epoch_to_datetime(v);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(cell) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S").ok()
}

// ── Reading ──

fn parse_price(record: &csv::StringRecord, idx: usize) -> Result<f64, String> {
    let cell = record.get(idx).ok_or_else(|| format!("missing column {idx}"))?;
    cell.trim()
        .parse::<f64>()
        .map_err(|_| format!("column {idx}: '{cell}' is not a number"))
}

/// Read one kline CSV file. A non-numeric first row is treated as a header.
pub fn read_kline_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

    let mut bars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let malformed = |reason: String| LoadError::Malformed {
            path: path.to_path_buf(),
            row,
            reason,
        };

        if record.len() < 6 {
            return Err(malformed(format!("expected at least 6 columns, got {}", record.len())));
        }
        let first = record.get(0).unwrap_or_default();
        let timestamp = match parse_timestamp(first) {
            Some(ts) => ts,
            None if row == 0 => continue,
            None => return Err(malformed(format!("unparseable timestamp '{first}'"))),
        };

        bars.push(Bar {
            timestamp,
            open: parse_price(&record, 1).map_err(malformed)?,
            high: parse_price(&record, 2).map_err(malformed)?,
            low: parse_price(&record, 3).map_err(malformed)?,
            close: parse_price(&record, 4).map_err(malformed)?,
            volume: parse_price(&record, 5).map_err(malformed)?,
        });
    }
    Ok(bars)
}

/// Bars loaded from disk plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedCandles {
    pub bars: Vec<Bar>,
    pub files: Vec<PathBuf>,
    pub missing_months: Vec<YearMonth>,
}

pub fn month_file(dir: &Path, symbol: &str, interval: &str, month: YearMonth) -> PathBuf {
    dir.join(format!("{symbol}-{interval}-{month}.csv"))
}

/// Load and concatenate the monthly files for `start..=end`.
///
/// Output is sorted by timestamp with duplicate timestamps removed
/// (first occurrence wins).
pub fn load_months(
    dir: &Path,
    symbol: &str,
    interval: &str,
    start: YearMonth,
    end: YearMonth,
) -> Result<LoadedCandles, LoadError> {
    if start > end {
        return Err(LoadError::EmptyRange { start, end });
    }

    let mut bars = Vec::new();
    let mut files = Vec::new();
    let mut missing_months = Vec::new();

    for month in YearMonth::range(start, end) {
        let path = month_file(dir, symbol, interval, month);
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "candle file missing, skipping month");
            missing_months.push(month);
            continue;
        }
        let month_bars = read_kline_csv(&path)?;
        tracing::debug!(path = %path.display(), rows = month_bars.len(), "loaded candle file");
        bars.extend(month_bars);
        files.push(path);
    }

    if bars.is_empty() {
        return Err(LoadError::NoData {
            dir: dir.to_path_buf(),
            symbol: symbol.to_string(),
            interval: interval.to_string(),
            start,
            end,
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    bars.dedup_by_key(|b| b.timestamp);

    tracing::info!(
        symbol,
        files = files.len(),
        missing = missing_months.len(),
        bars = bars.len(),
        "candles loaded"
    );

    Ok(LoadedCandles {
        bars,
        files,
        missing_months,
    })
}

// ── Resampling and cleaning ──

/// Aggregate sorted bars into fixed buckets: open=first, high=max, low=min,
/// close=last, volume=sum. Buckets with no source bars become void bars,
/// so the output has one bar per period from the first to the last bucket.
pub fn resample(bars: &[Bar], freq: Frequency) -> Vec<Bar> {
    let Some(first) = bars.first() else {
        return Vec::new();
    };
    let step = freq.duration();
    let mut out: Vec<Bar> = Vec::new();
    let mut bucket = freq.floor(first.timestamp);
    let mut current: Option<Bar> = None;

    for bar in bars {
        let key = freq.floor(bar.timestamp);
        if key != bucket {
            out.push(current.take().unwrap_or_else(|| Bar::void(bucket)));
            bucket += step;
            while bucket < key {
                out.push(Bar::void(bucket));
                bucket += step;
            }
        }
        current = Some(match current {
            None => Bar {
                timestamp: bucket,
                ..bar.clone()
            },
            Some(mut agg) => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
                agg
            }
        });
    }
    out.push(current.unwrap_or_else(|| Bar::void(bucket)));
    out
}

/// Outcome of [`clean`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanReport {
    /// Void bars replaced by the previous bar's prices.
    pub filled: usize,
    /// Void bars before the first valid bar, removed.
    pub dropped_leading: usize,
}

/// Forward-fill void bars from the previous valid bar (volume 0) and drop
/// leading voids that have nothing to fill from.
pub fn clean(bars: Vec<Bar>) -> (Vec<Bar>, CleanReport) {
    let mut report = CleanReport::default();
    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());

    for bar in bars {
        if !bar.is_void() {
            out.push(bar);
            continue;
        }
        match out.last() {
            Some(prev) => {
                let filled = Bar {
                    timestamp: bar.timestamp,
                    volume: 0.0,
                    ..prev.clone()
                };
                out.push(filled);
                report.filled += 1;
            }
            None => report.dropped_leading += 1,
        }
    }

    if report.filled > 0 || report.dropped_leading > 0 {
        tracing::info!(
            filled = report.filled,
            dropped_leading = report.dropped_leading,
            "cleaned void bars"
        );
    }
    (out, report)
}

// ── Synthetic data ──

/// Deterministic hourly random walk starting at 20 000 on 2023-01-01.
///
/// Drift switches sign every few hundred bars so the series has trends to
/// trade. Same seed, same bars.
pub fn synthetic_bars(n: usize, seed: u64) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2023, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default();

    let mut bars = Vec::with_capacity(n);
    let mut price = 20_000.0_f64;
    let mut drift = 0.0005;

    for i in 0..n {
        if i % 400 == 0 && i > 0 {
            drift = if rng.gen_bool(0.5) { 0.0006 } else { -0.0004 };
        }
        let r: f64 = drift + rng.gen_range(-0.008..0.008);
        let open = price;
        let close = (price * (1.0 + r)).max(1.0);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.004));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.004));
        bars.push(Bar {
            timestamp: start + Duration::hours(i as i64),
            open,
            high,
            low,
            close,
            volume: rng.gen_range(50.0..500.0),
        });
        price = close;
    }
    bars
}

/// Deterministic BLAKE3 hash over every bar's timestamp and OHLCV values.
pub fn dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(&bar.timestamp.and_utc().timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}
