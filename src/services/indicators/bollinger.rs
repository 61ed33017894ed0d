//! Bollinger Bands indicator.

use super::frame::IndicatorOutput;
use super::{require_candles, require_period, series, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// Bollinger Bands indicator.
///
/// Consists of:
/// - Middle band: SMA(20)
/// - Upper band: SMA + 2 * sample StdDev
/// - Lower band: SMA - 2 * sample StdDev
///
/// Also emits `bb_width` (band spread relative to the middle) and
/// `bb_position` (0 at the lower band, 1 at the upper band).
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub period: usize,
    pub std_dev_multiplier: f64,
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
        }
    }
}

impl Indicator for BollingerBands {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Bollinger
    }

    fn name(&self) -> String {
        format!("Bollinger Bands ({}, {})", self.period, self.std_dev_multiplier)
    }

    fn min_periods(&self) -> usize {
        self.period
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("Bollinger", self.period)?;
        require_candles("Bollinger", self.min_periods(), candles)?;

        let closes = series::closes(candles);
        let middle = series::sma(&closes, self.period);
        let std = series::rolling_std(&closes, self.period);

        let k = self.std_dev_multiplier;
        let upper = series::zip_with(&middle, &std, |m, s| m + s * k);
        let lower = series::zip_with(&middle, &std, |m, s| m - s * k);

        let spread = series::zip_with(&upper, &lower, |u, l| u - l);
        let width = series::zip_with(&spread, &middle, |s, m| if m != 0.0 { s / m } else { 0.0 });

        // Flat bands put price in the middle
        let position: Vec<Option<f64>> = closes
            .iter()
            .zip(lower.iter().zip(spread.iter()))
            .map(|(close, (lower, spread))| match (lower, spread) {
                (Some(l), Some(s)) if *s > 0.0 => Some((close - l) / s),
                (Some(_), Some(_)) => Some(0.5),
                _ => None,
            })
            .collect();

        Ok(IndicatorOutput::default()
            .with_column("bb_middle", middle)
            .with_column("bb_upper", upper)
            .with_column("bb_lower", lower)
            .with_column("bb_width", width)
            .with_column("bb_position", position))
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
    fn test_bands_surround_middle() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64).collect();
        let output = BollingerBands::default().compute(&create_candles(&closes)).unwrap();

        let middle = output.columns[0].1[29].unwrap();
        let upper = output.columns[1].1[29].unwrap();
        let lower = output.columns[2].1[29].unwrap();
        assert!(upper > middle && middle > lower);
        assert!((upper - middle - (middle - lower)).abs() < 1e-9);
    }

    #[test]
    fn test_position_near_upper_in_rally() {
        let closes: Vec<f64> = (0..25).map(|i| 100.0 + i as f64).collect();
        let output = BollingerBands::default().compute(&create_candles(&closes)).unwrap();
        let position = output.columns[4].1[24].unwrap();
        assert!(position > 0.8, "position = {}", position);
    }

    #[test]
    fn test_flat_prices() {
        let output = BollingerBands::default().compute(&create_candles(&[50.0; 20])).unwrap();
        assert_eq!(output.columns[3].1[19], Some(0.0));
        assert_eq!(output.columns[4].1[19], Some(0.5));
    }
}
