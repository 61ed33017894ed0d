use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLC candle. `time` is the candle open time in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }

    /// Absolute body size.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn upper_shadow(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_shadow(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    /// Midpoint of high and low.
    pub fn hl2(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// True range against the previous close. The first candle of a series
    /// has no previous close and uses its own range.
    pub fn true_range(&self, prev_close: Option<f64>) -> f64 {
        match prev_close {
            Some(pc) => self
                .range()
                .max((self.high - pc).abs())
                .max((self.low - pc).abs()),
            None => self.range(),
        }
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.time, 0).single()
    }
}

/// Chart timeframe of a candle series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Timeframe {
    M5,
    M10,
    M15,
    M30,
    H1,
    #[default]
    H2,
    H3,
    H4,
    H6,
    H12,
    D1,
}

impl Timeframe {
    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "M5" => Some(Self::M5),
            "M10" => Some(Self::M10),
            "M15" => Some(Self::M15),
            "M30" => Some(Self::M30),
            "H1" => Some(Self::H1),
            "H2" => Some(Self::H2),
            "H3" => Some(Self::H3),
            "H4" => Some(Self::H4),
            "H6" => Some(Self::H6),
            "H12" => Some(Self::H12),
            "D1" => Some(Self::D1),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::M5 => "M5",
            Self::M10 => "M10",
            Self::M15 => "M15",
            Self::M30 => "M30",
            Self::H1 => "H1",
            Self::H2 => "H2",
            Self::H3 => "H3",
            Self::H4 => "H4",
            Self::H6 => "H6",
            Self::H12 => "H12",
            Self::D1 => "D1",
        }
    }

    /// Candle length in minutes.
    pub fn minutes(&self) -> i64 {
        match self {
            Self::M5 => 5,
            Self::M10 => 10,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H2 => 120,
            Self::H3 => 180,
            Self::H4 => 240,
            Self::H6 => 360,
            Self::H12 => 720,
            Self::D1 => 1440,
        }
    }

    pub fn seconds(&self) -> i64 {
        self.minutes() * 60
    }

    /// Open time of the most recently opened candle at `at`.
    ///
    /// Boundaries are aligned to UTC midnight, so an H2 candle opens on even hours.
    pub fn latest_candle_start(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let secs = at.timestamp();
        let floored = secs - secs.rem_euclid(self.seconds());
        Utc.timestamp_opt(floored, 0).single().unwrap_or(at)
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
