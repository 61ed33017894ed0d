//! Average Directional Index (ADX) indicator.

use super::frame::IndicatorOutput;
use super::series::{self, Column};
use super::{require_candles, require_period, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// ADX (Average Directional Index) indicator.
///
/// Measures trend strength (not direction):
/// - Below 20: Weak trend / ranging market
/// - 20-40: Trending
/// - Above 40: Strong trend
///
/// Combined with +DI (`dmp`) and -DI (`dmn`) for direction.
#[derive(Debug, Clone)]
pub struct Adx {
    pub period: usize,
}

impl Default for Adx {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Indicator for Adx {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Adx
    }

    fn name(&self) -> String {
        format!("ADX ({})", self.period)
    }

    fn min_periods(&self) -> usize {
        self.period * 2
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("ADX", self.period)?;
        require_candles("ADX", self.min_periods(), candles)?;

        let mut plus_dm = Vec::with_capacity(candles.len() - 1);
        let mut minus_dm = Vec::with_capacity(candles.len() - 1);
        let mut tr = Vec::with_capacity(candles.len() - 1);

        // Calculate DM and TR
        for i in 1..candles.len() {
            let current = &candles[i];
            let previous = &candles[i - 1];

            let up_move = current.high - previous.high;
            let down_move = previous.low - current.low;

            plus_dm.push(if up_move > down_move && up_move > 0.0 { up_move } else { 0.0 });
            minus_dm.push(if down_move > up_move && down_move > 0.0 { down_move } else { 0.0 });
            tr.push(current.true_range(Some(previous.close)));
        }

        // Smoothed series are indexed from the second candle
        let smoothed_plus = series::wilder(&plus_dm, self.period);
        let smoothed_minus = series::wilder(&minus_dm, self.period);
        let smoothed_tr = series::wilder(&tr, self.period);

        let di = |dm: &Column| -> Column {
            series::zip_with(dm, &smoothed_tr, |dm, atr| if atr > 0.0 { dm / atr * 100.0 } else { 0.0 })
        };
        let plus_di = di(&smoothed_plus);
        let minus_di = di(&smoothed_minus);

        let dx = series::zip_with(&plus_di, &minus_di, |p, m| {
            let sum = p + m;
            if sum > 0.0 {
                (p - m).abs() / sum * 100.0
            } else {
                0.0
            }
        });
        let adx = series::smooth_defined(&dx, self.period, series::wilder);

        // Shift back onto the candle index
        let align = |column: Column| -> Column {
            let mut out = Vec::with_capacity(candles.len());
            out.push(None);
            out.extend(column);
            out
        };

        Ok(IndicatorOutput::default()
            .with_column("adx", align(adx))
            .with_column("dmp", align(plus_di))
            .with_column("dmn", align(minus_di)))
    }
}
