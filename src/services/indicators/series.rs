//! Column-level helpers shared by the indicator implementations.
//!
//! Every helper returns a column the same length as its input with `None`
//! in the warm-up rows.

use crate::types::Candle;

/// A numeric frame column. `None` marks rows where the value is undefined.
pub type Column = Vec<Option<f64>>;

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn highs(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.high).collect()
}

pub fn lows(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.low).collect()
}

/// True range per candle. The first candle uses its own high-low range.
pub fn true_ranges(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let prev_close = if i > 0 { Some(candles[i - 1].close) } else { None };
            c.true_range(prev_close)
        })
        .collect()
}

/// Apply `f` to each full window of `period` values ending at each row.
fn rolling<F>(values: &[f64], period: usize, f: F) -> Column
where
    F: Fn(&[f64]) -> f64,
{
    (0..values.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                None
            } else {
                Some(f(&values[i + 1 - period..=i]))
            }
        })
        .collect()
}

/// Simple moving average.
pub fn sma(values: &[f64], period: usize) -> Column {
    rolling(values, period, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn rolling_max(values: &[f64], period: usize) -> Column {
    rolling(values, period, |w| w.iter().copied().fold(f64::NEG_INFINITY, f64::max))
}

pub fn rolling_min(values: &[f64], period: usize) -> Column {
    rolling(values, period, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Rolling sample standard deviation (n - 1 denominator).
pub fn rolling_std(values: &[f64], period: usize) -> Column {
    rolling(values, period, |w| {
        if w.len() < 2 {
            return 0.0;
        }
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let variance = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
        variance.sqrt()
    })
}

/// Exponential moving average seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Column {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);

    // First EMA is SMA
    let mut ema = values.iter().take(period).sum::<f64>() / period as f64;
    out[period - 1] = Some(ema);

    for (i, value) in values.iter().enumerate().skip(period) {
        ema = (value - ema) * multiplier + ema;
        out[i] = Some(ema);
    }

    out
}

/// Wilder's smoothing (RMA), seeded with the SMA of the first `period` values.
pub fn wilder(values: &[f64], period: usize) -> Column {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut smoothed = values.iter().take(period).sum::<f64>() / period as f64;
    out[period - 1] = Some(smoothed);

    for (i, value) in values.iter().enumerate().skip(period) {
        smoothed = (smoothed * (period - 1) as f64 + value) / period as f64;
        out[i] = Some(smoothed);
    }

    out
}

/// Run a dense smoother over the defined tail of a column.
///
/// The column must be `None` for a leading run and defined afterwards, which
/// is what every helper in this module produces.
pub fn smooth_defined<F>(column: &[Option<f64>], period: usize, f: F) -> Column
where
    F: Fn(&[f64], usize) -> Column,
{
    let Some(start) = column.iter().position(Option::is_some) else {
        return vec![None; column.len()];
    };

    let tail: Vec<f64> = column[start..].iter().map(|v| v.unwrap_or(f64::NAN)).collect();
    let mut out = vec![None; start];
    out.extend(f(&tail, period));
    out
}

/// Element-wise combination of two columns, `None` where either side is.
pub fn zip_with<F>(a: &[Option<f64>], b: &[Option<f64>], f: F) -> Column
where
    F: Fn(f64, f64) -> f64,
{
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) => Some(f(*x, *y)),
            _ => None,
        })
        .collect()
}

/// Mean of the defined values of a column.
pub fn mean_defined(values: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = values.iter().flatten().copied().collect();
    if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_warmup() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(out, vec![None, None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let out = ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert_eq!(out[1], None);
        assert_eq!(out[2], Some(4.0));
        // multiplier 0.5: (8 - 4) * 0.5 + 4
        assert_eq!(out[3], Some(6.0));
    }

    #[test]
    fn test_rolling_std_is_sample() {
        let out = rolling_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0], 8);
        let std = out[7].unwrap();
        assert!((std - 2.138).abs() < 0.001);
    }

    #[test]
    fn test_rolling_extremes() {
        let values = [3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(rolling_max(&values, 2)[4], Some(5.0));
        assert_eq!(rolling_min(&values, 3)[4], Some(1.0));
    }

    #[test]
    fn test_smooth_defined_keeps_alignment() {
        let column = vec![None, None, Some(1.0), Some(3.0), Some(5.0)];
        let out = smooth_defined(&column, 2, sma);
        assert_eq!(out, vec![None, None, None, Some(2.0), Some(4.0)]);
    }

    #[test]
    fn test_true_ranges_first_row() {
        let candles = vec![
            Candle::new(0, 10.0, 12.0, 9.0, 11.0),
            Candle::new(1, 11.0, 11.5, 10.5, 11.0),
        ];
        let tr = true_ranges(&candles);
        assert_eq!(tr[0], 3.0);
        assert_eq!(tr[1], 1.0);
    }
}
