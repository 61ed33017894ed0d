//! Ichimoku cloud indicator.

use super::frame::IndicatorOutput;
use super::series::{self, Column};
use super::{require_candles, require_period, Indicator, IndicatorKind};
use crate::error::IndicatorError;
use crate::types::Candle;

/// Ichimoku Kinko Hyo.
///
/// - Tenkan-sen: midpoint of the `tenkan`-candle high/low range
/// - Kijun-sen: midpoint of the `kijun`-candle range
/// - Senkou span A: average of tenkan and kijun
/// - Senkou span B: midpoint of the `senkou_b`-candle range
/// - Chikou span: close displaced back by `kijun` candles
///
/// The spans are kept on the current row rather than projected forward, so
/// the cloud compares directly against the current close. The last `kijun`
/// chikou rows are undefined until gap filling.
#[derive(Debug, Clone)]
pub struct Ichimoku {
    pub tenkan: usize,
    pub kijun: usize,
    pub senkou_b: usize,
}

impl Default for Ichimoku {
    fn default() -> Self {
        Self {
            tenkan: 9,
            kijun: 26,
            senkou_b: 52,
        }
    }
}

impl Ichimoku {
    fn midpoint(highs: &[f64], lows: &[f64], period: usize) -> Column {
        series::zip_with(
            &series::rolling_max(highs, period),
            &series::rolling_min(lows, period),
            |h, l| (h + l) / 2.0,
        )
    }
}

impl Indicator for Ichimoku {
    fn kind(&self) -> IndicatorKind {
        IndicatorKind::Ichimoku
    }

    fn name(&self) -> String {
        format!("Ichimoku ({}, {}, {})", self.tenkan, self.kijun, self.senkou_b)
    }

    fn min_periods(&self) -> usize {
        self.tenkan.max(self.kijun).max(self.senkou_b)
    }

    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError> {
        require_period("Ichimoku", self.tenkan)?;
        require_period("Ichimoku", self.kijun)?;
        require_period("Ichimoku", self.senkou_b)?;
        require_candles("Ichimoku", self.min_periods(), candles)?;

        let highs = series::highs(candles);
        let lows = series::lows(candles);

        let tenkan = Self::midpoint(&highs, &lows, self.tenkan);
        let kijun = Self::midpoint(&highs, &lows, self.kijun);
        let span_a = series::zip_with(&tenkan, &kijun, |t, k| (t + k) / 2.0);
        let span_b = Self::midpoint(&highs, &lows, self.senkou_b);
        let thickness = series::zip_with(&span_a, &span_b, |a, b| (a - b).abs());

        let chikou: Column = (0..candles.len())
            .map(|i| candles.get(i + self.kijun).map(|c| c.close))
            .collect();

        Ok(IndicatorOutput::default()
            .with_column("tenkan_sen", tenkan)
            .with_column("kijun_sen", kijun)
            .with_column("senkou_span_a", span_a)
            .with_column("senkou_span_b", span_b)
            .with_column("cloud_thickness", thickness)
            .with_column("chikou_span", chikou))
    }
}
