//! Moving Average Convergence Divergence (MACD) indicator.

use super::frame::IndicatorOutput;
use super::{require_candles, require_period, series, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// MACD indicator.
///
/// - MACD line: fast EMA - slow EMA
/// - Signal line: EMA of the MACD line
/// - Histogram: MACD - Signal
#[derive(Debug, Clone)]
pub struct Macd {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

impl Indicator for Macd {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Macd
    }

    fn name(&self) -> String {
        format!("MACD ({}, {}, {})", self.fast, self.slow, self.signal)
    }

    fn min_periods(&self) -> usize {
        self.slow + self.signal - 1
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("MACD", self.fast)?;
        require_period("MACD", self.slow)?;
        require_period("MACD", self.signal)?;
        if self.fast >= self.slow {
            return Err(IndicatorError::InvalidParameter {
                indicator: "MACD",
                reason: format!("fast period {} must be below slow period {}", self.fast, self.slow),
            });
        }
        require_candles("MACD", self.min_periods(), candles)?;

        let closes = series::closes(candles);
        let fast = series::ema(&closes, self.fast);
        let slow = series::ema(&closes, self.slow);

        let macd = series::zip_with(&fast, &slow, |f, s| f - s);
        let signal = series::smooth_defined(&macd, self.signal, series::ema);
        let hist = series::zip_with(&macd, &signal, |m, s| m - s);

        Ok(IndicatorOutput::default()
            .with_column("macd", macd)
            .with_column("macd_signal", signal)
            .with_column("macd_hist", hist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle::new(i as i64, c, c + 1.0, c - 1.0, c))
            .collect()
    }

    #[test]
    fn test_macd_warmup_alignment() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let output = Macd::default().compute(&create_candles(&closes)).unwrap();
        let macd = &output.columns[0].1;
        let signal = &output.columns[1].1;

        assert!(macd[24].is_none());
        assert!(macd[25].is_some());
        assert!(signal[32].is_none());
        assert!(signal[33].is_some());
    }

    #[test]
    fn test_macd_positive_in_uptrend() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 1.5).collect();
        let output = Macd::default().compute(&create_candles(&closes)).unwrap();
        let macd = output.columns[0].1[49].unwrap();
        let hist = output.columns[2].1[49].unwrap();
        let signal = output.columns[1].1[49].unwrap();

        assert!(macd > 0.0);
        assert!((macd - signal - hist).abs() < 1e-9);
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        let macd = Macd {
            fast: 26,
            slow: 12,
            signal: 9,
        };
        let err = macd.compute(&create_candles(&[1.0; 60])).unwrap_err();
        assert!(matches!(err, IndicatorError::InvalidParameter { .. }));
    }
}
