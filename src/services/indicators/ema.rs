//! Exponential Moving Average (EMA) indicator.

use super::frame::IndicatorOutput;
use super::{require_candles, require_period, series, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// EMA (Exponential Moving Average) over one or more periods.
///
/// Like SMA but gives more weight to recent prices. Each period produces an
/// `ema_{period}` column; the fast/slow pair drives the trend scorer's
/// golden and death cross detection.
#[derive(Debug, Clone)]
pub struct Ema {
    pub periods: Vec<usize>,
}

impl Default for Ema {
    fn default() -> Self {
        Self { periods: vec![9, 21] }
    }
}

impl Ema {
    pub fn new(periods: Vec<usize>) -> Self {
        Self { periods }
    }

    pub fn column_name(period: usize) -> String {
        format!("ema_{}", period)
    }
}

impl Indicator for Ema {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Ema
    }

    fn name(&self) -> String {
        let periods: Vec<String> = self.periods.iter().map(|p| p.to_string()).collect();
        format!("EMA ({})", periods.join(", "))
    }

    fn min_periods(&self) -> usize {
        self.periods.iter().copied().max().unwrap_or(0)
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        if self.periods.is_empty() {
            return Err(IndicatorError::InvalidParameter {
                indicator: "EMA",
                reason: "no periods configured".to_string(),
            });
        }
        for &period in &self.periods {
            require_period("EMA", period)?;
        }
        require_candles("EMA", self.min_periods(), candles)?;

        let closes = series::closes(candles);
        let output = self.periods.iter().fold(IndicatorOutput::default(), |out, &period| {
            out.with_column(Self::column_name(period), series::ema(&closes, period))
        });

        Ok(output)
    }
}
