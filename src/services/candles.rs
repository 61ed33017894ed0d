//! Candle feeds and scoped broker sessions.
//!
//! A feed hands out ascending OHLC bars per symbol and timeframe. Broker
//! connections are opened per run through [`FeedSession`], which shuts the
//! connection down when dropped, including on early returns and errors.

use crate::error::{AppError, Result};
use crate::types::{Candle, Timeframe};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Source of OHLC bars, modelled on a broker terminal API.
pub trait CandleFeed: Send + Sync {
    fn name(&self) -> &str;

    /// Connect to the upstream source.
    fn initialize(&self) -> Result<()>;

    /// Release the upstream connection.
    fn shutdown(&self);

    /// Up to `count` candles opened at or before `until` (epoch seconds),
    /// ascending. `None` when the source has nothing for the request.
    fn copy_rates_until(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        until: i64,
        count: usize,
    ) -> Option<Vec<Candle>>;
}

/// Open time of the last fully closed candle at `now`.
pub fn latest_complete_candle(timeframe: Timeframe, now: DateTime<Utc>) -> DateTime<Utc> {
    timeframe.latest_candle_start(now) - Duration::seconds(timeframe.seconds())
}

/// An initialized feed. Dropping the session shuts the feed down.
pub struct FeedSession<'a> {
    feed: &'a dyn CandleFeed,
}

impl<'a> FeedSession<'a> {
    pub fn open(feed: &'a dyn CandleFeed) -> Result<Self> {
        feed.initialize()?;
        debug!("Opened {} feed session", feed.name());
        Ok(Self { feed })
    }

    /// Fetch candles up to `until`, treating an empty answer as unavailable.
    pub fn fetch(&self, symbol: &str, timeframe: Timeframe, until: i64, count: usize) -> Result<Vec<Candle>> {
        match self.feed.copy_rates_until(symbol, timeframe, until, count) {
            Some(candles) if !candles.is_empty() => Ok(candles),
            _ => Err(AppError::UpstreamUnavailable(format!(
                "{} returned no {} {} candles",
                self.feed.name(),
                symbol,
                timeframe
            ))),
        }
    }
}

impl Drop for FeedSession<'_> {
    fn drop(&mut self) {
        self.feed.shutdown();
        debug!("Closed {} feed session", self.feed.name());
    }
}

fn tail_until(candles: &[Candle], until: i64, count: usize) -> Vec<Candle> {
    let end = candles.partition_point(|c| c.time <= until);
    let start = end.saturating_sub(count);
    candles[start..end].to_vec()
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    time: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

fn parse_time(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return Some(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y.%m.%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
}

/// Feed reading exported bars from `{dir}/{SYMBOL}_{TF}.csv`.
///
/// Files need `time,open,high,low,close` headers; extra columns such as
/// volume are ignored. Times are epoch seconds or `YYYY-MM-DD HH:MM[:SS]` UTC.
#[derive(Debug, Clone)]
pub struct CsvCandleFeed {
    dir: PathBuf,
}

impl CsvCandleFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.dir.join(format!("{}_{}.csv", symbol.to_uppercase(), timeframe.name()))
    }

    fn load(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Candle>> {
        let path = self.path_for(symbol, timeframe);
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(&path)?;

        let mut candles = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row?;
            match parse_time(&row.time) {
                Some(time) => candles.push(Candle::new(time, row.open, row.high, row.low, row.close)),
                None => warn!("Skipping row with unreadable time {:?} in {}", row.time, path.display()),
            }
        }

        candles.sort_by_key(|c| c.time);
        candles.dedup_by_key(|c| c.time);
        Ok(candles)
    }
}

impl CandleFeed for CsvCandleFeed {
    fn name(&self) -> &str {
        "csv"
    }

    fn initialize(&self) -> Result<()> {
        if self.dir.is_dir() {
            Ok(())
        } else {
            Err(AppError::UpstreamUnavailable(format!(
                "candle directory {} not found",
                self.dir.display()
            )))
        }
    }

    fn shutdown(&self) {}

    fn copy_rates_until(&self, symbol: &str, timeframe: Timeframe, until: i64, count: usize) -> Option<Vec<Candle>> {
        match self.load(symbol, timeframe) {
            Ok(candles) => {
                let tail = tail_until(&candles, until, count);
                info!("Loaded {} {} {} candles from csv", tail.len(), symbol, timeframe);
                Some(tail)
            }
            Err(e) => {
                warn!("Failed to read {} {} candles: {}", symbol, timeframe, e);
                None
            }
        }
    }
}

/// In-memory feed, used for tests and replay.
#[derive(Debug, Default)]
pub struct MemoryCandleFeed {
    series: DashMap<(String, Timeframe), Vec<Candle>>,
    sessions_opened: AtomicUsize,
    sessions_closed: AtomicUsize,
}

impl MemoryCandleFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, symbol: &str, timeframe: Timeframe, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.time);
        self.series.insert((symbol.to_uppercase(), timeframe), candles);
    }

    pub fn sessions_opened(&self) -> usize {
        self.sessions_opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.sessions_closed.load(Ordering::SeqCst)
    }
}

impl CandleFeed for MemoryCandleFeed {
    fn name(&self) -> &str {
        "memory"
    }

    fn initialize(&self) -> Result<()> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn shutdown(&self) {
        self.sessions_closed.fetch_add(1, Ordering::SeqCst);
    }

    fn copy_rates_until(&self, symbol: &str, timeframe: Timeframe, until: i64, count: usize) -> Option<Vec<Candle>> {
        let series = self.series.get(&(symbol.to_uppercase(), timeframe))?;
        Some(tail_until(&series, until, count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hourly(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let p = 2600.0 + i as f64;
                Candle::new(i as i64 * 3600, p, p + 2.0, p - 1.0, p + 1.0)
            })
            .collect()
    }

    #[test]
    fn test_latest_complete_candle() {
        let now = Utc.with_ymd_and_hms(2025, 3, 4, 13, 16, 0).unwrap();
        assert_eq!(
            latest_complete_candle(Timeframe::H2, now),
            Utc.with_ymd_and_hms(2025, 3, 4, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_tail_until() {
        let candles = hourly(10);
        let tail = tail_until(&candles, 5 * 3600, 3);
        assert_eq!(tail.iter().map(|c| c.time / 3600).collect::<Vec<_>>(), vec![3, 4, 5]);
        assert!(tail_until(&candles, -1, 3).is_empty());
    }

    #[test]
    fn test_session_shuts_down_on_error() {
        let feed = MemoryCandleFeed::new();
        {
            let session = FeedSession::open(&feed).unwrap();
            let err = session.fetch("XAUUSD", Timeframe::H2, 0, 10).unwrap_err();
            assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        }
        assert_eq!(feed.sessions_opened(), 1);
        assert_eq!(feed.sessions_closed(), 1);
    }

    #[test]
    fn test_csv_feed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("XAUUSD_H1.csv"),
            "time,open,high,low,close,tick_volume\n\
             2025-03-04 02:00:00,2901.0,2905.0,2899.0,2904.0,10\n\
             2025-03-04 00:00:00,2890.0,2896.0,2888.0,2895.0,12\n\
             1741050000,2895.0,2902.0,2894.0,2901.0,9\n",
        )
        .unwrap();

        let feed = CsvCandleFeed::new(dir.path());
        let until = Utc.with_ymd_and_hms(2025, 3, 4, 1, 0, 0).unwrap().timestamp();
        let candles = feed.copy_rates_until("xauusd", Timeframe::H1, until, 10).unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].close, 2895.0);
        assert_eq!(candles[1].time, until);
        assert!(feed.copy_rates_until("EURUSD", Timeframe::H1, until, 10).is_none());
    }
}
