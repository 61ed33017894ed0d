//! SuperTrend indicator.

use super::frame::{IndicatorOutput, TrendSignal};
use super::series::{self, Column};
use super::{require_candles, require_period, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// SuperTrend indicator.
///
/// ATR bands around the high/low midpoint that trail price:
/// - basic upper = hl2 + multiplier * ATR, basic lower = hl2 - multiplier * ATR
/// - while price holds above the previous line the trend is up (+1) and the
///   line ratchets up along the lower band
/// - once price closes below it the trend flips down (-1) and the line
///   follows the upper band
///
/// ATR here is the plain rolling mean of true range over `period`.
#[derive(Debug, Clone)]
pub struct SuperTrend {
    pub period: usize,
    pub multiplier: f64,
}

impl Default for SuperTrend {
    fn default() -> Self {
        Self {
            period: 10,
            multiplier: 2.0,
        }
    }
}

/// Fold state carried from one row to the next.
#[derive(Debug, Clone, Copy)]
struct Step {
    value: f64,
    trend: i8,
}

impl SuperTrend {
    /// Run the recurrence left to right.
    ///
    /// Rows before the first defined band are undefined. The first defined
    /// row seeds the trend: close at or below the upper band starts a
    /// downtrend on the upper band, otherwise an uptrend on the lower band.
    fn fold(candles: &[Candle], upper: &Column, lower: &Column) -> Vec<Option<Step>> {
        let mut steps = Vec::with_capacity(candles.len());
        let mut prev: Option<Step> = None;

        for (i, candle) in candles.iter().enumerate() {
            let next = match (prev, upper[i], lower[i]) {
                (None, Some(up), Some(low)) => Some(if candle.close <= up {
                    Step { value: up, trend: -1 }
                } else {
                    Step { value: low, trend: 1 }
                }),
                (Some(p), Some(up), Some(low)) => Some(if p.value <= candle.close {
                    Step {
                        value: low.max(p.value),
                        trend: 1,
                    }
                } else {
                    Step {
                        value: up.min(p.value),
                        trend: -1,
                    }
                }),
                (p, _, _) => p,
            };
            steps.push(next);
            prev = next;
        }

        steps
    }

    fn signals(trend: &[Option<i8>]) -> Vec<Option<TrendSignal>> {
        trend
            .iter()
            .enumerate()
            .map(|(i, current)| {
                let current = (*current)?;
                let previous = if i > 0 { trend[i - 1] } else { None };
                Some(match (previous, current) {
                    (Some(-1), 1) => TrendSignal::Buy,
                    (Some(1), -1) => TrendSignal::Sell,
                    _ => TrendSignal::Hold,
                })
            })
            .collect()
    }
}

impl Indicator for SuperTrend {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Supertrend
    }

    fn name(&self) -> String {
        format!("SuperTrend ({}, {})", self.period, self.multiplier)
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("SuperTrend", self.period)?;
        if !(self.multiplier > 0.0) {
            return Err(IndicatorError::InvalidParameter {
                indicator: "SuperTrend",
                reason: format!("multiplier must be positive, got {}", self.multiplier),
            });
        }
        require_candles("SuperTrend", self.min_periods(), candles)?;

        let atr = series::sma(&series::true_ranges(candles), self.period);
        let hl2: Vec<Option<f64>> = candles.iter().map(|c| Some(c.hl2())).collect();
        let upper = series::zip_with(&hl2, &atr, |mid, atr| mid + self.multiplier * atr);
        let lower = series::zip_with(&hl2, &atr, |mid, atr| mid - self.multiplier * atr);

        let steps = Self::fold(candles, &upper, &lower);
        let value: Column = steps.iter().map(|s| s.map(|s| s.value)).collect();
        let trend: Vec<Option<i8>> = steps.iter().map(|s| s.map(|s| s.trend)).collect();

        let price_distance: Column = candles
            .iter()
            .zip(value.iter())
            .map(|(c, v)| v.map(|v| (c.close - v).abs()))
            .collect();
        let trend_strength = series::zip_with(&price_distance, &value, |d, v| {
            if v != 0.0 {
                d / v * 100.0
            } else {
                0.0
            }
        });

        let signals = Self::signals(&trend);

        Ok(IndicatorOutput::default()
            .with_column("supertrend", value)
            .with_column("supertrend_trend", trend.iter().map(|t| t.map(f64::from)).collect())
            .with_column("price_distance", price_distance)
            .with_column("trend_strength", trend_strength)
            .with_signals("supertrend_signal", signals))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Falls for 20 candles then rises for 20.
    fn create_v_candles() -> Vec<Candle> {
        (0..40)
            .map(|i| {
                let base = if i < 20 {
                    200.0 - i as f64 * 3.0
                } else {
                    143.0 + (i - 20) as f64 * 3.0
                };
                Candle::new(i as i64, base, base + 1.0, base - 1.0, base)
            })
            .collect()
    }

    fn trend_at(output: &IndicatorOutput, i: usize) -> f64 {
        output
            .columns
            .iter()
            .find(|(n, _)| n == "supertrend_trend")
            .and_then(|(_, c)| c[i])
            .unwrap()
    }

    #[test]
    fn test_supertrend_flips_on_reversal() {
        let output = SuperTrend::default().compute(&create_v_candles()).unwrap();

        assert_eq!(trend_at(&output, 15), -1.0);
        assert_eq!(trend_at(&output, 39), 1.0);
    }

    #[test]
    fn test_signals_mark_transitions_only() {
        let output = SuperTrend::default().compute(&create_v_candles()).unwrap();
        let trend: Vec<Option<f64>> = output
            .columns
            .iter()
            .find(|(n, _)| n == "supertrend_trend")
            .map(|(_, c)| c.clone())
            .unwrap();
        let signals = &output.signals[0].1;

        for i in 1..trend.len() {
            let expected = match (trend[i - 1], trend[i]) {
                (Some(p), Some(c)) if p == -1.0 && c == 1.0 => Some(TrendSignal::Buy),
                (Some(p), Some(c)) if p == 1.0 && c == -1.0 => Some(TrendSignal::Sell),
                (_, Some(_)) => Some(TrendSignal::Hold),
                (_, None) => None,
            };
            assert_eq!(signals[i], expected, "row {}", i);
        }
        assert!(signals.contains(&Some(TrendSignal::Buy)));
    }

    #[test]
    fn test_warmup_rows_undefined() {
        let output = SuperTrend::default().compute(&create_v_candles()).unwrap();
        let value = &output.columns[0].1;

        assert!(value[8].is_none());
        assert!(value[9].is_some());
    }

    #[test]
    fn test_uptrend_line_ratchets_up() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + i as f64 * 2.0;
                Candle::new(i as i64, base, base + 1.0, base - 1.0, base + 0.5)
            })
            .collect();
        let output = SuperTrend::default().compute(&candles).unwrap();
        let value = &output.columns[0].1;

        for i in 11..30 {
            assert!(value[i].unwrap() >= value[i - 1].unwrap());
        }
        assert_eq!(trend_at(&output, 29), 1.0);
    }

    #[test]
    fn test_rejects_non_positive_multiplier() {
        let st = SuperTrend {
            period: 10,
            multiplier: 0.0,
        };
        assert!(matches!(
            st.compute(&create_v_candles()),
            Err(IndicatorError::InvalidParameter { .. })
        ));
    }
}
