//! Stochastic Oscillator indicator.

use super::frame::IndicatorOutput;
use super::series::Column;
use super::{require_candles, require_period, series, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// Stochastic Oscillator.
///
/// Compares closing price to price range over a period:
/// raw %K = (Close - Lowest Low) / (Highest High - Lowest Low) * 100
///
/// `stoch_k` is raw %K smoothed over `smooth_k` candles and `stoch_d` is the
/// SMA of `stoch_k` over `d` candles.
#[derive(Debug, Clone)]
pub struct Stochastic {
    pub k: usize,
    pub d: usize,
    pub smooth_k: usize,
}

impl Default for Stochastic {
    fn default() -> Self {
        Self {
            k: 14,
            d: 3,
            smooth_k: 3,
        }
    }
}

impl Stochastic {
    /// Column name used by pandas-style libraries, kept as a lookup fallback.
    pub fn legacy_k_name(&self) -> String {
        format!("STOCHk_{}_{}_{}", self.k, self.d, self.smooth_k)
    }

    pub fn legacy_d_name(&self) -> String {
        format!("STOCHd_{}_{}_{}", self.k, self.d, self.smooth_k)
    }

    fn raw_k(candles: &[Candle], period: usize) -> Column {
        let mut out = vec![None; candles.len()];

        for i in (period - 1)..candles.len() {
            let window = &candles[(i + 1 - period)..=i];

            let lowest_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
            let highest_high = window
                .iter()
                .map(|c| c.high)
                .fold(f64::NEG_INFINITY, f64::max);

            let k = if highest_high != lowest_low {
                ((candles[i].close - lowest_low) / (highest_high - lowest_low)) * 100.0
            } else {
                50.0
            };
            out[i] = Some(k);
        }

        out
    }
}

impl Indicator for Stochastic {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Stochastic
    }

    fn name(&self) -> String {
        format!("Stochastic ({}, {}, {})", self.k, self.d, self.smooth_k)
    }

    fn min_periods(&self) -> usize {
        self.k + self.smooth_k + self.d - 2
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("Stochastic", self.k)?;
        require_period("Stochastic", self.d)?;
        require_period("Stochastic", self.smooth_k)?;
        require_candles("Stochastic", self.min_periods(), candles)?;

        let raw = Self::raw_k(candles, self.k);
        let k = series::smooth_defined(&raw, self.smooth_k, series::sma);
        let d = series::smooth_defined(&k, self.d, series::sma);

        Ok(IndicatorOutput::default()
            .with_column("stoch_k", k)
            .with_column("stoch_d", d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_uptrend_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64;
                Candle::new(i as i64, base, base + 1.0, base - 0.5, base + 0.8)
            })
            .collect()
    }

    #[test]
    fn test_stochastic_high_in_uptrend() {
        let output = Stochastic::default().compute(&create_uptrend_candles(30)).unwrap();
        let k = output.columns[0].1[29].unwrap();
        let d = output.columns[1].1[29].unwrap();

        assert!(k > 80.0, "k = {}", k);
        assert!(d > 80.0, "d = {}", d);
    }

    #[test]
    fn test_stochastic_flat_range() {
        let candles: Vec<Candle> = (0..20).map(|i| Candle::new(i, 5.0, 5.0, 5.0, 5.0)).collect();
        let output = Stochastic::default().compute(&candles).unwrap();
        assert_eq!(output.columns[0].1[19], Some(50.0));
    }

    #[test]
    fn test_stochastic_warmup() {
        let output = Stochastic::default().compute(&create_uptrend_candles(30)).unwrap();
        let k = &output.columns[0].1;
        let d = &output.columns[1].1;

        // raw %K from row 13, smoothed %K from 15, %D from 17
        assert!(k[14].is_none());
        assert!(k[15].is_some());
        assert!(d[16].is_none());
        assert!(d[17].is_some());
    }

    #[test]
    fn test_legacy_names() {
        let stoch = Stochastic::default();
        assert_eq!(stoch.legacy_k_name(), "STOCHk_14_3_3");
        assert_eq!(stoch.legacy_d_name(), "STOCHd_14_3_3");
    }
}
