//! Five-candle pattern analysis.
//!
//! Looks at the candle at an index and the four before it, classifies the
//! current candle against average ATR and summarizes the five-candle trend.
//! The report renders to a single line of text for prompts and logs.

use crate::error::IndicatorError;
use crate::services::indicators::IndicatorFrame;
use crate::types::Candle;
use serde::Serialize;
use std::fmt;

/// Number of candles in the analysis window.
pub const WINDOW: usize = 5;

const DOJI_BODY_RATIO: f64 = 0.2;
const STRONG_BODY_ATR: f64 = 1.5;
const EXTREME_BODY_ATR: f64 = 2.0;
const EXTREME_MOVE_ATR: f64 = 1.5;
const DOMINANT_RANGE_FACTOR: f64 = 1.5;
const SIZE_TREND_THRESHOLD: f64 = 0.2;
const MAJORITY: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleDirection {
    Bullish,
    Bearish,
}

impl CandleDirection {
    fn of(candle: &Candle) -> Self {
        if candle.is_bullish() {
            Self::Bullish
        } else {
            Self::Bearish
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bullish => "Bullish",
            Self::Bearish => "Bearish",
        }
    }
}

/// Notable single-candle event, checked in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum KeyPattern {
    /// Body larger than 1.5x the previous candle's full range.
    DominantMomentum { direction: CandleDirection },
    BreakoutAbove,
    BreakdownBelow,
    LongUpperShadow,
    LongLowerShadow,
}

/// Body size relative to the average ATR of the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "class", content = "ratio")]
pub enum BodySize {
    VeryLarge(f64),
    Large(f64),
    Small(f64),
    Ordinary,
}

impl BodySize {
    fn classify(body_to_atr: f64) -> Self {
        if body_to_atr > 2.0 {
            Self::VeryLarge(body_to_atr)
        } else if body_to_atr > 1.5 {
            Self::Large(body_to_atr)
        } else if body_to_atr < 0.5 {
            Self::Small(body_to_atr)
        } else {
            Self::Ordinary
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CurrentCandle {
    StrongMomentum {
        direction: CandleDirection,
        upper_shadow: f64,
        lower_shadow: f64,
    },
    Doji,
    Normal {
        direction: CandleDirection,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FiveCandleTrend {
    IncreasingBullish,
    IncreasingBearish,
    DiminishingBullish,
    DiminishingBearish,
    NoClearPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
    /// Extreme current candle: the window is summarized by its direction alone.
    Dominated { direction: CandleDirection },
}

/// Result of analyzing the five candles ending at an index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternReport {
    pub index: usize,
    pub key_pattern: Option<KeyPattern>,
    pub current: CurrentCandle,
    pub body_size: BodySize,
    /// `None` when an extreme current candle suppressed the trend classification.
    pub trend: Option<FiveCandleTrend>,
    pub sentiment: Sentiment,
    pub bull_count: usize,
    /// Mean fractional change in body size across the window.
    pub size_trend: f64,
    pub avg_atr: f64,
}

impl PatternReport {
    pub fn suppressed(&self) -> bool {
        self.trend.is_none()
    }
}

/// Analyze the window ending at `index` using the frame's `atr` column.
pub fn analyze_frame(frame: &IndicatorFrame, index: usize) -> Result<PatternReport, IndicatorError> {
    let atr = frame.column("atr").ok_or_else(|| IndicatorError::MissingColumn {
        candidates: vec!["atr".to_string()],
    })?;
    analyze_pattern(frame.candles(), atr, index)
}

/// Analyze the five candles ending at `index`.
///
/// `atr` must be aligned with `candles`. Indices below 5 do not have enough
/// history.
pub fn analyze_pattern(
    candles: &[Candle],
    atr: &[Option<f64>],
    index: usize,
) -> Result<PatternReport, IndicatorError> {
    if index < WINDOW || index >= candles.len() {
        return Err(IndicatorError::InsufficientData {
            indicator: "candle pattern",
            required: WINDOW + 1,
            available: (index + 1).min(candles.len()),
        });
    }

    let window = &candles[index + 1 - WINDOW..=index];
    let atr_window: Vec<f64> = atr
        .get(index + 1 - WINDOW..=index)
        .map(|w| w.iter().flatten().copied().collect())
        .unwrap_or_default();
    if atr_window.is_empty() {
        return Err(IndicatorError::MissingColumn {
            candidates: vec!["atr".to_string()],
        });
    }
    let avg_atr = atr_window.iter().sum::<f64>() / atr_window.len() as f64;

    let current = &window[WINDOW - 1];
    let prev = &window[WINDOW - 2];
    let direction = CandleDirection::of(current);
    let body = current.body();
    let upper_shadow = current.upper_shadow();
    let lower_shadow = current.lower_shadow();
    let body_ratio = if current.range() > 0.0 { body / current.range() } else { 0.0 };
    let body_to_atr = if avg_atr > 0.0 { body / avg_atr } else { 0.0 };

    let key_pattern = if body > prev.range() * DOMINANT_RANGE_FACTOR {
        Some(KeyPattern::DominantMomentum { direction })
    } else if current.close > prev.high {
        Some(KeyPattern::BreakoutAbove)
    } else if current.close < prev.low {
        Some(KeyPattern::BreakdownBelow)
    } else if upper_shadow > avg_atr {
        Some(KeyPattern::LongUpperShadow)
    } else if lower_shadow > avg_atr {
        Some(KeyPattern::LongLowerShadow)
    } else {
        None
    };

    let suppress = body > avg_atr * EXTREME_BODY_ATR
        || (current.close - prev.close).abs() > avg_atr * EXTREME_MOVE_ATR;

    let current_kind = if body > avg_atr * STRONG_BODY_ATR {
        CurrentCandle::StrongMomentum {
            direction,
            upper_shadow,
            lower_shadow,
        }
    } else if body_ratio < DOJI_BODY_RATIO {
        CurrentCandle::Doji
    } else {
        CurrentCandle::Normal { direction }
    };

    let bull_count = window.iter().filter(|c| c.is_bullish()).count();
    let bear_count = WINDOW - bull_count;
    let size_trend = mean_body_change(window);

    let (trend, sentiment) = if suppress {
        (None, Sentiment::Dominated { direction })
    } else {
        let trend = if size_trend > SIZE_TREND_THRESHOLD && bull_count >= MAJORITY {
            FiveCandleTrend::IncreasingBullish
        } else if size_trend > SIZE_TREND_THRESHOLD && bear_count >= MAJORITY {
            FiveCandleTrend::IncreasingBearish
        } else if size_trend < -SIZE_TREND_THRESHOLD && bull_count >= MAJORITY {
            FiveCandleTrend::DiminishingBullish
        } else if size_trend < -SIZE_TREND_THRESHOLD && bear_count >= MAJORITY {
            FiveCandleTrend::DiminishingBearish
        } else {
            FiveCandleTrend::NoClearPattern
        };
        let sentiment = match bull_count.cmp(&bear_count) {
            std::cmp::Ordering::Greater => Sentiment::Bullish,
            std::cmp::Ordering::Less => Sentiment::Bearish,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        };
        (Some(trend), sentiment)
    };

    Ok(PatternReport {
        index,
        key_pattern,
        current: current_kind,
        body_size: BodySize::classify(body_to_atr),
        trend,
        sentiment,
        bull_count,
        size_trend,
        avg_atr,
    })
}

/// Mean of consecutive fractional body-size changes. Pairs whose earlier body
/// is zero have no defined change and are skipped.
fn mean_body_change(window: &[Candle]) -> f64 {
    let changes: Vec<f64> = window
        .windows(2)
        .filter(|pair| pair[0].body() > 0.0)
        .map(|pair| (pair[1].body() - pair[0].body()) / pair[0].body())
        .collect();

    if changes.is_empty() {
        0.0
    } else {
        changes.iter().sum::<f64>() / changes.len() as f64
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DominantMomentum { direction } => write!(
                f,
                "Current candle strongly exceeds previous candle size, indicating dominant {} momentum.",
                direction.name()
            ),
            Self::BreakoutAbove => f.write_str(
                "Current candle closes above the previous candle's high, confirming breakout to the upside.",
            ),
            Self::BreakdownBelow => f.write_str(
                "Current candle closes below the previous candle's low, confirming breakdown to the downside.",
            ),
            Self::LongUpperShadow => f.write_str(
                "Current candle shows a long upper shadow, indicating strong rejection at higher levels.",
            ),
            Self::LongLowerShadow => f.write_str(
                "Current candle shows a long lower shadow, indicating strong buying pressure at lower levels.",
            ),
        }
    }
}

impl fmt::Display for BodySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VeryLarge(r) => write!(f, " showing very large body size ({:.1}x ATR)", r),
            Self::Large(r) => write!(f, " showing large body size ({:.1}x ATR)", r),
            Self::Small(r) => write!(f, " showing small body size ({:.1}x ATR)", r),
            Self::Ordinary => Ok(()),
        }
    }
}

impl fmt::Display for FiveCandleTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::IncreasingBullish => "Increasing Bullish Candlestick Pattern: Starts with small bullish candles that evolve into larger bullish candles, indicating strengthening upward momentum.",
            Self::IncreasingBearish => "Increasing Bearish Candlestick Pattern: Starts with small bearish candles that evolve into larger bearish candles, signaling accelerating downward momentum.",
            Self::DiminishingBullish => "Diminishing Bullish Candlestick Pattern: Begins with strong bullish candles that gradually decrease in size, reflecting weakening upward momentum.",
            Self::DiminishingBearish => "Diminishing Bearish Candlestick Pattern: Starts with strong bearish candles that gradually shrink, indicating fading downward momentum.",
            Self::NoClearPattern => "No clear 5-candle trend pattern detected.",
        })
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => f.write_str("Bullish Sentiment: Buyers dominate over sellers."),
            Self::Bearish => f.write_str("Bearish Sentiment: Sellers overpower buyers."),
            Self::Neutral => f.write_str("Neutral Sentiment: Buyers and sellers are evenly matched."),
            Self::Dominated { direction } => write!(
                f,
                "Market dominated by {} sentiment with heightened activity in the current candle.",
                direction.name()
            ),
        }
    }
}

impl PatternReport {
    fn current_text(&self) -> String {
        match self.current {
            CurrentCandle::StrongMomentum {
                direction,
                upper_shadow,
                lower_shadow,
            } => format!(
                "Current candle displays Strong {} Momentum{} with notable shadows: upper shadow {:.2}, lower shadow {:.2}.",
                direction.name(),
                self.body_size,
                upper_shadow,
                lower_shadow
            ),
            CurrentCandle::Doji => format!(
                "Current candle shows Doji formation{} with significant indecision.",
                self.body_size
            ),
            CurrentCandle::Normal { direction } => format!(
                "Current candle shows Normal {} movement{}.",
                direction.name(),
                self.body_size
            ),
        }
    }
}

impl fmt::Display for PatternReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current_text();
        match (&self.key_pattern, &self.trend) {
            (Some(key), _) => write!(f, "{} | {} {}", key, current, self.sentiment),
            (None, Some(trend)) => write!(f, "{} | {} {}", current, trend, self.sentiment),
            (None, None) => write!(
                f,
                "{} | Significant price action detected: No further pattern analysis performed due to strong current candle movement. {}",
                current, self.sentiment
            ),
        }
    }
}
