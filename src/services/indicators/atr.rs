//! Average True Range (ATR) indicator.

use super::frame::IndicatorOutput;
use super::{require_candles, require_period, series, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// ATR (Average True Range) indicator.
///
/// Measures market volatility by smoothing the true range:
/// TR = max(High-Low, |High-PrevClose|, |Low-PrevClose|)
///
/// Uses Wilder's smoothing over the true ranges from the second candle on.
#[derive(Debug, Clone)]
pub struct Atr {
    pub period: usize,
}

impl Default for Atr {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Indicator for Atr {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Atr
    }

    fn name(&self) -> String {
        format!("ATR ({})", self.period)
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("ATR", self.period)?;
        require_candles("ATR", self.min_periods(), candles)?;

        let true_ranges = series::true_ranges(candles);
        let mut atr = vec![None];
        atr.extend(series::wilder(&true_ranges[1..], self.period));

        Ok(IndicatorOutput::default().with_column("atr", atr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atr_constant_range() {
        let candles: Vec<Candle> = (0..20)
            .map(|i| Candle::new(i, 100.0, 102.0, 98.0, 100.0))
            .collect();
        let output = Atr::default().compute(&candles).unwrap();
        let atr = &output.columns[0].1;

        assert!(atr[13].is_none());
        assert_eq!(atr[14], Some(4.0));
        assert_eq!(atr[19], Some(4.0));
    }

    #[test]
    fn test_atr_includes_gaps() {
        let mut candles: Vec<Candle> = (0..16)
            .map(|i| Candle::new(i, 100.0, 101.0, 99.0, 100.0))
            .collect();
        // Gap up: TR = 110.5 - 100 = 10.5
        candles.push(Candle::new(16, 110.0, 110.5, 109.5, 110.0));
        let output = Atr::default().compute(&candles).unwrap();
        let atr = &output.columns[0].1;

        assert!(atr[16].unwrap() > atr[15].unwrap());
    }
}
