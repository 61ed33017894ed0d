//! Fibonacci retracement levels.

use super::frame::IndicatorOutput;
use super::{require_candles, require_period, series, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// Retracement ratios and their column names.
pub const LEVELS: [(&str, f64); 5] = [
    ("fib_236", 0.236),
    ("fib_382", 0.382),
    ("fib_500", 0.500),
    ("fib_618", 0.618),
    ("fib_786", 0.786),
];

/// Rolling Fibonacci retracement.
///
/// Levels are measured down from the `period`-candle high:
/// level = high - (high - low) * ratio
#[derive(Debug, Clone)]
pub struct Fibonacci {
    pub period: usize,
}

impl Default for Fibonacci {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Indicator for Fibonacci {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Fibonacci
    }

    fn name(&self) -> String {
        format!("Fibonacci ({})", self.period)
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("Fibonacci", self.period)?;
        require_candles("Fibonacci", self.min_periods(), candles)?;

        let high = series::rolling_max(&series::highs(candles), self.period);
        let low = series::rolling_min(&series::lows(candles), self.period);

        let output = LEVELS.iter().fold(IndicatorOutput::default(), |out, (name, ratio)| {
            out.with_column(*name, series::zip_with(&high, &low, |h, l| h - (h - l) * ratio))
        });

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_are_ordered() {
        let candles: Vec<Candle> = (0..30)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.7).sin() * 10.0;
                Candle::new(i as i64, base, base + 2.0, base - 2.0, base + 0.5)
            })
            .collect();
        let output = Fibonacci::default().compute(&candles).unwrap();

        for row in 13..30 {
            let values: Vec<f64> = output.columns.iter().map(|(_, c)| c[row].unwrap()).collect();
            for pair in values.windows(2) {
                assert!(pair[0] >= pair[1], "row {}: {:?}", row, values);
            }
        }
    }

    #[test]
    fn test_fib_500_is_midpoint() {
        let candles: Vec<Candle> = (0..14)
            .map(|i| Candle::new(i, 100.0, 100.0 + i as f64, 90.0, 95.0))
            .collect();
        let output = Fibonacci::default().compute(&candles).unwrap();
        // high 113, low 90
        assert_eq!(output.columns[2].1[13], Some(101.5));
    }
}
