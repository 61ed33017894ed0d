//! Weighted trend scoring from EMA, Ichimoku and MACD.
//!
//! Weights: EMA +/-1, Ichimoku +/-2 (strong) or +/-1, MACD +/-1.5. The
//! summed points map to a [`TrendLabel`] via [`TrendLabel::from_points`].

use crate::error::IndicatorError;
use crate::services::indicators::{Ema, FrameRow, IndicatorFrame};
use crate::types::{ContributingSignals, IchimokuBias, SignalBias, TrendLabel, TrendVerdict};
use tracing::{debug, warn};

/// EMA values for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaReading {
    pub close: f64,
    pub fast: f64,
    pub slow: f64,
}

/// Ichimoku values for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IchimokuReading {
    pub close: f64,
    pub tenkan: f64,
    pub kijun: f64,
    pub span_a: f64,
    pub span_b: f64,
}

/// MACD values for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdReading {
    pub macd: f64,
    pub signal: f64,
    pub hist: f64,
}

/// EMA bias from a crossover or the price/EMA stack.
pub fn ema_bias(current: EmaReading, previous: EmaReading) -> SignalBias {
    let diff = current.fast - current.slow;
    let prev_diff = previous.fast - previous.slow;
    let above_fast = current.close > current.fast;
    let above_slow = current.close > current.slow;

    let golden_cross = diff > 0.0 && prev_diff <= 0.0;
    let death_cross = diff < 0.0 && prev_diff >= 0.0;

    if golden_cross {
        SignalBias::Bullish
    } else if death_cross {
        SignalBias::Bearish
    } else if diff > 0.0 && above_fast && above_slow {
        SignalBias::Bullish
    } else if diff < 0.0 && !above_fast && !above_slow {
        SignalBias::Bearish
    } else {
        SignalBias::Neutral
    }
}

/// Ichimoku bias from price versus the cloud, cloud color and tenkan/kijun.
pub fn ichimoku_bias(r: IchimokuReading) -> IchimokuBias {
    let above_cloud = r.close > r.span_a && r.close > r.span_b;
    let below_cloud = r.close < r.span_a && r.close < r.span_b;
    let bullish_cloud = r.span_a > r.span_b;
    let tenkan_above = r.tenkan > r.kijun;

    if above_cloud && tenkan_above && bullish_cloud {
        IchimokuBias::StrongBullish
    } else if above_cloud {
        IchimokuBias::Bullish
    } else if below_cloud && !tenkan_above && !bullish_cloud {
        IchimokuBias::StrongBearish
    } else if below_cloud {
        IchimokuBias::Bearish
    } else {
        IchimokuBias::Neutral
    }
}

/// MACD bias from the signal line and histogram direction.
///
/// The zero-line check in the strong cases is implied by the weaker ones, so
/// only signal position and histogram slope decide.
pub fn macd_bias(current: MacdReading, previous: MacdReading) -> SignalBias {
    let above_signal = current.macd > current.signal;
    let hist_increasing = current.hist > previous.hist;

    if above_signal && hist_increasing {
        SignalBias::Bullish
    } else if !above_signal && !hist_increasing {
        SignalBias::Bearish
    } else {
        SignalBias::Neutral
    }
}

/// Weighted sum of the three readings.
pub fn trend_points(signals: &ContributingSignals) -> f64 {
    let ema = match signals.ema {
        SignalBias::Bullish => 1.0,
        SignalBias::Bearish => -1.0,
        SignalBias::Neutral => 0.0,
    };
    let ichimoku = match signals.ichimoku {
        IchimokuBias::StrongBullish => 2.0,
        IchimokuBias::Bullish => 1.0,
        IchimokuBias::Neutral => 0.0,
        IchimokuBias::Bearish => -1.0,
        IchimokuBias::StrongBearish => -2.0,
    };
    let macd = match signals.macd {
        SignalBias::Bullish => 1.5,
        SignalBias::Bearish => -1.5,
        SignalBias::Neutral => 0.0,
    };
    ema + ichimoku + macd
}

/// Scores the latest two rows of a frame.
#[derive(Debug, Clone)]
pub struct TrendScorer {
    pub fast_ema: usize,
    pub slow_ema: usize,
}

impl Default for TrendScorer {
    fn default() -> Self {
        Self {
            fast_ema: 9,
            slow_ema: 21,
        }
    }
}

impl TrendScorer {
    pub fn new(fast_ema: usize, slow_ema: usize) -> Self {
        Self { fast_ema, slow_ema }
    }

    /// Build a scorer from the configured EMA periods (first two, in order).
    pub fn from_ema(ema: &Ema) -> Self {
        match ema.periods.as_slice() {
            [fast, slow, ..] => Self::new(*fast, *slow),
            _ => Self::default(),
        }
    }

    /// Score the last row against the one before it.
    ///
    /// An indicator whose columns are missing, or whose cells in a row it
    /// reads are back-filled warm-up values, contributes a neutral reading.
    pub fn score(&self, frame: &IndicatorFrame) -> Result<TrendVerdict, IndicatorError> {
        let (previous, current) = frame.latest_pair().ok_or(IndicatorError::InsufficientData {
            indicator: "trend scorer",
            required: 2,
            available: frame.len(),
        })?;

        let ema = match (self.ema_reading(&current), self.ema_reading(&previous)) {
            (Ok(c), Ok(p)) => ema_bias(c, p),
            (Err(e), _) | (_, Err(e)) => {
                warn!("EMA reading unavailable, scoring as neutral: {}", e);
                SignalBias::Neutral
            }
        };
        let ichimoku = match Self::ichimoku_reading(&current) {
            Ok(r) => ichimoku_bias(r),
            Err(e) => {
                warn!("Ichimoku reading unavailable, scoring as neutral: {}", e);
                IchimokuBias::Neutral
            }
        };
        let macd = match (Self::macd_reading(&current), Self::macd_reading(&previous)) {
            (Ok(c), Ok(p)) => macd_bias(c, p),
            (Err(e), _) | (_, Err(e)) => {
                warn!("MACD reading unavailable, scoring as neutral: {}", e);
                SignalBias::Neutral
            }
        };

        let contributing_signals = ContributingSignals { ema, ichimoku, macd };
        let score = trend_points(&contributing_signals);
        let label = TrendLabel::from_points(score);

        let close = current.close();
        let prev_close = previous.close();
        let change = close - prev_close;
        let change_pct = if prev_close != 0.0 { change / prev_close * 100.0 } else { 0.0 };

        debug!(
            "Trend signals: ema={} ichimoku={} macd={} points={}",
            ema.name(),
            ichimoku.name(),
            macd.name(),
            score
        );

        Ok(TrendVerdict {
            label,
            score,
            contributing_signals,
            close,
            change,
            change_pct,
        })
    }

    fn ema_reading(&self, row: &FrameRow<'_>) -> Result<EmaReading, IndicatorError> {
        let fast = Ema::column_name(self.fast_ema);
        let slow = Ema::column_name(self.slow_ema);
        let fast_alt = format!("EMA_{}", self.fast_ema);
        let slow_alt = format!("EMA_{}", self.slow_ema);
        Ok(EmaReading {
            close: row.close(),
            fast: row.settled(&[&fast, &fast_alt])?,
            slow: row.settled(&[&slow, &slow_alt])?,
        })
    }

    fn ichimoku_reading(row: &FrameRow<'_>) -> Result<IchimokuReading, IndicatorError> {
        Ok(IchimokuReading {
            close: row.close(),
            tenkan: row.settled(&["tenkan_sen", "ITS_9"])?,
            kijun: row.settled(&["kijun_sen", "IKS_26"])?,
            span_a: row.settled(&["senkou_span_a", "ISA_9"])?,
            span_b: row.settled(&["senkou_span_b", "ISB_26"])?,
        })
    }

    fn macd_reading(row: &FrameRow<'_>) -> Result<MacdReading, IndicatorError> {
        Ok(MacdReading {
            macd: row.settled(&["macd", "MACD_12_26_9"])?,
            signal: row.settled(&["macd_signal", "MACDs_12_26_9"])?,
            hist: row.settled(&["macd_hist", "MACDh_12_26_9"])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ema(close: f64, fast: f64, slow: f64) -> EmaReading {
        EmaReading { close, fast, slow }
    }

    #[test]
    fn test_golden_cross() {
        assert_eq!(ema_bias(ema(100.0, 101.0, 100.5), ema(99.0, 99.0, 99.5)), SignalBias::Bullish);
    }

    #[test]
    fn test_death_cross() {
        assert_eq!(ema_bias(ema(100.0, 99.0, 99.5), ema(101.0, 101.0, 100.5)), SignalBias::Bearish);
    }

    #[test]
    fn test_ema_cross_beats_stack() {
        // Golden cross even though price sits below both EMAs
        assert_eq!(ema_bias(ema(90.0, 100.1, 100.0), ema(90.0, 99.9, 100.0)), SignalBias::Bullish);
    }

    #[test]
    fn test_ema_stack_without_cross() {
        assert_eq!(ema_bias(ema(105.0, 103.0, 101.0), ema(104.0, 102.0, 100.0)), SignalBias::Bullish);
        assert_eq!(ema_bias(ema(102.0, 103.0, 101.0), ema(104.0, 102.0, 100.0)), SignalBias::Neutral);
        assert_eq!(ema_bias(ema(95.0, 97.0, 99.0), ema(96.0, 98.0, 100.0)), SignalBias::Bearish);
    }

    #[test]
    fn test_ichimoku_bias() {
        let r = |close, tenkan, kijun, span_a, span_b| IchimokuReading {
            close,
            tenkan,
            kijun,
            span_a,
            span_b,
        };
        assert_eq!(ichimoku_bias(r(110.0, 105.0, 103.0, 104.0, 100.0)), IchimokuBias::StrongBullish);
        assert_eq!(ichimoku_bias(r(110.0, 101.0, 103.0, 104.0, 100.0)), IchimokuBias::Bullish);
        assert_eq!(ichimoku_bias(r(90.0, 95.0, 97.0, 96.0, 100.0)), IchimokuBias::StrongBearish);
        assert_eq!(ichimoku_bias(r(90.0, 99.0, 97.0, 96.0, 100.0)), IchimokuBias::Bearish);
        assert_eq!(ichimoku_bias(r(102.0, 99.0, 97.0, 104.0, 100.0)), IchimokuBias::Neutral);
    }

    #[test]
    fn test_macd_bias() {
        let m = |macd, signal, hist| MacdReading { macd, signal, hist };
        assert_eq!(macd_bias(m(1.0, 0.5, 0.5), m(0.8, 0.5, 0.3)), SignalBias::Bullish);
        assert_eq!(macd_bias(m(-1.0, 0.5, -1.5), m(0.8, 0.5, 0.3)), SignalBias::Bearish);
        assert_eq!(macd_bias(m(1.0, 0.5, 0.5), m(0.8, 0.2, 0.6)), SignalBias::Neutral);
    }

    #[test]
    fn test_points_weights() {
        let signals = ContributingSignals {
            ema: SignalBias::Bullish,
            ichimoku: IchimokuBias::StrongBullish,
            macd: SignalBias::Bearish,
        };
        assert_eq!(trend_points(&signals), 1.5);

        let signals = ContributingSignals {
            ema: SignalBias::Bearish,
            ichimoku: IchimokuBias::StrongBearish,
            macd: SignalBias::Bearish,
        };
        assert_eq!(trend_points(&signals), -4.5);
        assert_eq!(TrendLabel::from_points(-4.5), TrendLabel::StrongBearish);
    }

    #[test]
    fn test_scorer_from_ema_config() {
        let scorer = TrendScorer::from_ema(&Ema::new(vec![5, 13]));
        assert_eq!((scorer.fast_ema, scorer.slow_ema), (5, 13));
        let scorer = TrendScorer::from_ema(&Ema::new(vec![5]));
        assert_eq!((scorer.fast_ema, scorer.slow_ema), (9, 21));
    }
}
