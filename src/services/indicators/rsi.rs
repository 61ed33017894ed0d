//! Relative Strength Index (RSI) indicator.

use super::frame::IndicatorOutput;
use super::series::Column;
use super::{require_candles, require_period, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// RSI (Relative Strength Index) indicator.
///
/// Measures momentum on a 0-100 scale using Wilder's smoothing:
/// - Above 70: Overbought
/// - Below 30: Oversold
#[derive(Debug, Clone)]
pub struct Rsi {
    pub period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    /// RSI column; the first defined row is `period`.
    fn calculate_rsi(candles: &[Candle], period: usize) -> Column {
        let mut out = vec![None; candles.len()];

        let mut gains = Vec::with_capacity(candles.len());
        let mut losses = Vec::with_capacity(candles.len());
        for i in 1..candles.len() {
            let change = candles[i].close - candles[i - 1].close;
            gains.push(change.max(0.0));
            losses.push((-change).max(0.0));
        }

        let mut avg_gain = gains.iter().take(period).sum::<f64>() / period as f64;
        let mut avg_loss = losses.iter().take(period).sum::<f64>() / period as f64;
        out[period] = Some(Self::rsi_value(avg_gain, avg_loss));

        for i in period..gains.len() {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[i]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[i]) / period as f64;
            out[i + 1] = Some(Self::rsi_value(avg_gain, avg_loss));
        }

        out
    }

    fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
        if avg_loss == 0.0 {
            return if avg_gain == 0.0 { 50.0 } else { 100.0 };
        }
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}

impl Indicator for Rsi {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Rsi
    }

    fn name(&self) -> String {
        format!("RSI ({})", self.period)
    }

    fn min_periods(&self) -> usize {
        self.period + 1
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("RSI", self.period)?;
        require_candles("RSI", self.min_periods(), candles)?;

        Ok(IndicatorOutput::default().with_column("rsi", Self::calculate_rsi(candles, self.period)))
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
    fn test_rsi_all_gains() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let output = Rsi::default().compute(&create_candles(&closes)).unwrap();
        let rsi = &output.columns[0].1;

        assert!(rsi[13].is_none());
        assert_eq!(rsi[14], Some(100.0));
        assert_eq!(rsi[19], Some(100.0));
    }

    #[test]
    fn test_rsi_bounds() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + if i % 3 == 0 { 2.0 } else { -1.0 } * i as f64 / 10.0)
            .collect();
        let output = Rsi::default().compute(&create_candles(&closes)).unwrap();

        for value in output.columns[0].1.iter().flatten() {
            assert!((0.0..=100.0).contains(value));
        }
    }

    #[test]
    fn test_rsi_flat_prices_neutral() {
        let output = Rsi::default().compute(&create_candles(&[50.0; 20])).unwrap();
        assert_eq!(output.columns[0].1[19], Some(50.0));
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let err = Rsi::default().compute(&create_candles(&[1.0; 14])).unwrap_err();
        assert!(matches!(err, IndicatorError::InsufficientData { required: 15, available: 14, .. }));
    }
}
