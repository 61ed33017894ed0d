//! Plain-language description of each computed indicator at a row.
//!
//! Used to build model prompts. Indicators missing from the frame are
//! skipped rather than treated as errors.

use crate::services::indicators::{fibonacci, FrameRow, IndicatorFrame, TrendSignal};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RsiSummary {
    pub value: f64,
    pub status: &'static str,
    pub trend: &'static str,
    pub divergence: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdSummary {
    pub macd: f64,
    pub signal: f64,
    pub hist: f64,
    pub momentum: &'static str,
    pub cross: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmaSummary {
    pub fast: f64,
    pub slow: f64,
    pub trend: &'static str,
    pub position: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BollingerSummary {
    pub middle: f64,
    pub upper: f64,
    pub lower: f64,
    pub direction: &'static str,
    pub band_state: &'static str,
    pub position: &'static str,
    pub volatility: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StochasticSummary {
    pub k: f64,
    pub d: f64,
    pub status: &'static str,
    pub cross: &'static str,
    pub trend: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdxSummary {
    pub adx: f64,
    pub dmp: f64,
    pub dmn: f64,
    pub strength: &'static str,
    pub quality: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IchimokuSummary {
    pub tenkan: f64,
    pub kijun: f64,
    pub span_a: f64,
    pub span_b: f64,
    pub cloud: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuperTrendSummary {
    pub value: f64,
    pub direction: &'static str,
    pub price_distance: f64,
    pub signal: Option<TrendSignal>,
    pub strength: &'static str,
    pub position_change: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AtrSummary {
    pub value: f64,
    pub trend: &'static str,
    pub volatility: &'static str,
    pub price_range: f64,
    pub movement: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FibonacciSummary {
    pub levels: Vec<(String, f64)>,
    pub position: &'static str,
    pub nearest: String,
}

/// Descriptions of every indicator available at one frame row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSummary {
    pub rsi: Option<RsiSummary>,
    pub macd: Option<MacdSummary>,
    pub ema: Option<EmaSummary>,
    pub bollinger: Option<BollingerSummary>,
    pub stochastic: Option<StochasticSummary>,
    pub adx: Option<AdxSummary>,
    pub ichimoku: Option<IchimokuSummary>,
    pub supertrend: Option<SuperTrendSummary>,
    pub atr: Option<AtrSummary>,
    pub fibonacci: Option<FibonacciSummary>,
}

fn increasing_label(current: f64, previous: f64) -> &'static str {
    if current > previous {
        "Increasing"
    } else if current < previous {
        "Decreasing"
    } else {
        "Stable"
    }
}

/// Summarize the row at `index` against the row before it.
pub fn summarize(frame: &IndicatorFrame, index: usize, fast_ema: usize, slow_ema: usize) -> IndicatorSummary {
    let (Some(current), Some(previous)) = (frame.row(index), index.checked_sub(1).and_then(|i| frame.row(i))) else {
        return IndicatorSummary::default();
    };

    IndicatorSummary {
        rsi: rsi(&current, &previous),
        macd: macd(&current, &previous),
        ema: ema(&current, fast_ema, slow_ema),
        bollinger: bollinger(frame, &current, &previous),
        stochastic: stochastic(&current, &previous),
        adx: adx(&current),
        ichimoku: ichimoku(&current),
        supertrend: supertrend(&current, &previous),
        atr: atr(frame, &current, &previous),
        fibonacci: fib(&current),
    }
}

fn rsi(current: &FrameRow<'_>, previous: &FrameRow<'_>) -> Option<RsiSummary> {
    let value = current.get("rsi")?;
    let prev = previous.get("rsi")?;

    let status = if value > 70.0 {
        "Overbought"
    } else if value < 30.0 {
        "Oversold"
    } else {
        "Neutral"
    };
    let trend = if value > prev { "Strengthening" } else { "Weakening" };
    let divergence = if current.close() < previous.close() && value > prev {
        "Bullish"
    } else if current.close() > previous.close() && value < prev {
        "Bearish"
    } else {
        "None"
    };

    Some(RsiSummary {
        value,
        status,
        trend,
        divergence,
    })
}

fn macd(current: &FrameRow<'_>, previous: &FrameRow<'_>) -> Option<MacdSummary> {
    let macd = current.get("macd")?;
    let signal = current.get("macd_signal")?;
    let hist = current.get("macd_hist")?;
    let prev_hist = previous.get("macd_hist")?;

    let momentum = if hist > prev_hist && hist > 0.0 {
        "Strong Bullish"
    } else if hist > 0.0 {
        "Weak Bullish"
    } else if hist < prev_hist && hist < 0.0 {
        "Strong Bearish"
    } else {
        "Weak Bearish"
    };
    let cross = if macd > signal && hist > 0.0 {
        "Bullish Cross"
    } else if macd < signal && hist < 0.0 {
        "Bearish Cross"
    } else {
        "No Clear Signal"
    };

    Some(MacdSummary {
        macd,
        signal,
        hist,
        momentum,
        cross,
    })
}

fn ema(current: &FrameRow<'_>, fast_period: usize, slow_period: usize) -> Option<EmaSummary> {
    let fast = current.get(&format!("ema_{}", fast_period))?;
    let slow = current.get(&format!("ema_{}", slow_period))?;

    Some(EmaSummary {
        fast,
        slow,
        trend: if fast > slow { "Bullish" } else { "Bearish" },
        position: if current.close() > fast { "Above fast EMA" } else { "Below fast EMA" },
    })
}

fn bollinger(frame: &IndicatorFrame, current: &FrameRow<'_>, previous: &FrameRow<'_>) -> Option<BollingerSummary> {
    let middle = current.get("bb_middle")?;
    let upper = current.get("bb_upper")?;
    let lower = current.get("bb_lower")?;
    let width = current.get("bb_width")?;
    let position = current.get("bb_position")?;
    let prev_width = previous.get("bb_width")?;
    let prev_middle = previous.get("bb_middle")?;

    // Width state against the whole frame: beyond one standard deviation of the mean
    let widths: Vec<f64> = frame.column("bb_width")?.iter().flatten().copied().collect();
    let mean = widths.iter().sum::<f64>() / widths.len() as f64;
    let std = if widths.len() > 1 {
        (widths.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / (widths.len() - 1) as f64).sqrt()
    } else {
        0.0
    };
    let band_state = if width > mean + std {
        "expanding"
    } else if width < mean - std {
        "contracting"
    } else {
        "normal"
    };

    Some(BollingerSummary {
        middle,
        upper,
        lower,
        direction: if middle - prev_middle > 0.0 { "Bullish" } else { "Bearish" },
        band_state,
        position: if position > 0.8 {
            "near upper band"
        } else if position < 0.2 {
            "near lower band"
        } else {
            "in middle area"
        },
        volatility: increasing_label(width, prev_width),
    })
}

fn stochastic(current: &FrameRow<'_>, previous: &FrameRow<'_>) -> Option<StochasticSummary> {
    let k = current.get("stoch_k")?;
    let d = current.get("stoch_d")?;
    let prev_k = previous.get("stoch_k")?;

    let trend = if k > 80.0 && k > prev_k {
        "Strong Uptrend"
    } else if k < 20.0 && k < prev_k {
        "Strong Downtrend"
    } else if k > prev_k {
        "Moderate Uptrend"
    } else {
        "Moderate Downtrend"
    };

    Some(StochasticSummary {
        k,
        d,
        status: if k > 80.0 {
            "Overbought"
        } else if k < 20.0 {
            "Oversold"
        } else {
            "Neutral"
        },
        cross: if k > d { "Bullish Cross" } else { "Bearish Cross" },
        trend,
    })
}

fn adx(current: &FrameRow<'_>) -> Option<AdxSummary> {
    let adx = current.get("adx")?;
    let quality = if adx > 40.0 {
        "Very Strong"
    } else if adx > 25.0 {
        "Strong"
    } else if adx > 20.0 {
        "Moderate"
    } else if adx > 15.0 {
        "Weak"
    } else {
        "No Trend"
    };

    Some(AdxSummary {
        adx,
        dmp: current.get("dmp")?,
        dmn: current.get("dmn")?,
        strength: if adx > 25.0 { "Strong Trend" } else { "Weak Trend" },
        quality,
    })
}

fn ichimoku(current: &FrameRow<'_>) -> Option<IchimokuSummary> {
    let span_a = current.get("senkou_span_a")?;
    let span_b = current.get("senkou_span_b")?;
    let close = current.close();

    let cloud = if close > span_a && close > span_b {
        "Strong Bullish (Price Above Cloud)"
    } else if close < span_a && close < span_b {
        "Strong Bearish (Price Below Cloud)"
    } else if span_a > span_b {
        "Bullish Cloud"
    } else if span_a < span_b {
        "Bearish Cloud"
    } else {
        "Neutral"
    };

    Some(IchimokuSummary {
        tenkan: current.get("tenkan_sen")?,
        kijun: current.get("kijun_sen")?,
        span_a,
        span_b,
        cloud,
    })
}

fn supertrend(current: &FrameRow<'_>, previous: &FrameRow<'_>) -> Option<SuperTrendSummary> {
    let value = current.get("supertrend")?;
    let trend = current.get("supertrend_trend")?;
    let prev_trend = previous.get("supertrend_trend")?;

    let position_change = if trend > 0.0 && prev_trend < 0.0 {
        "New Bullish"
    } else if trend < 0.0 && prev_trend > 0.0 {
        "New Bearish"
    } else if trend > 0.0 {
        "Maintaining Bullish"
    } else {
        "Maintaining Bearish"
    };

    Some(SuperTrendSummary {
        value,
        direction: if trend > 0.0 { "BULLISH" } else { "BEARISH" },
        price_distance: current.get("price_distance")?,
        signal: current.signal("supertrend_signal"),
        strength: if current.get("trend_strength")? > 1.0 { "STRONG" } else { "MODERATE" },
        position_change,
    })
}

fn atr(frame: &IndicatorFrame, current: &FrameRow<'_>, previous: &FrameRow<'_>) -> Option<AtrSummary> {
    let value = current.get("atr")?;
    let prev = previous.get("atr")?;

    let start = (current.index() + 1).saturating_sub(14);
    let recent = frame.column("atr")?.get(start..=current.index())?;
    let mean = crate::services::indicators::series::mean_defined(recent)?;

    let range = current.candle().range();

    Some(AtrSummary {
        value,
        trend: increasing_label(value, prev),
        volatility: if value > mean {
            "High"
        } else if value < mean {
            "Low"
        } else {
            "Normal"
        },
        price_range: range,
        movement: if range > value { "Clean" } else { "Choppy" },
    })
}

fn fib(current: &FrameRow<'_>) -> Option<FibonacciSummary> {
    let mut levels = Vec::with_capacity(fibonacci::LEVELS.len());
    for (name, _) in fibonacci::LEVELS {
        levels.push((name.to_string(), current.get(name)?));
    }

    let close = current.close();
    let nearest = levels
        .iter()
        .min_by(|a, b| (close - a.1).abs().total_cmp(&(close - b.1).abs()))
        .map(|(name, _)| format!("Near {}", name.to_uppercase()))?;
    let mid = current.get("fib_500")?;

    Some(FibonacciSummary {
        levels,
        position: if close > mid { "Above 50% Level" } else { "Below 50% Level" },
        nearest,
    })
}

impl IndicatorSummary {
    /// Multi-line text block, one indicator per line.
    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(r) = &self.rsi {
            let _ = writeln!(
                out,
                "RSI: {:.2} ({}), {}, divergence: {}",
                r.value, r.status, r.trend, r.divergence
            );
        }
        if let Some(m) = &self.macd {
            let _ = writeln!(
                out,
                "MACD: {:.2} / signal {:.2} / hist {:.2}, momentum {}, {}",
                m.macd, m.signal, m.hist, m.momentum, m.cross
            );
        }
        if let Some(e) = &self.ema {
            let _ = writeln!(out, "EMA: fast {:.2}, slow {:.2}, {} structure, price {}", e.fast, e.slow, e.trend, e.position);
        }
        if let Some(b) = &self.bollinger {
            let _ = writeln!(
                out,
                "Bollinger: upper {:.2}, middle {:.2}, lower {:.2}, {} direction, bands {}, price {}, volatility {}",
                b.upper, b.middle, b.lower, b.direction, b.band_state, b.position, b.volatility
            );
        }
        if let Some(s) = &self.stochastic {
            let _ = writeln!(
                out,
                "Stochastic: %K {:.2}, %D {:.2}, {}, {}, {}",
                s.k, s.d, s.status, s.cross, s.trend
            );
        }
        if let Some(a) = &self.adx {
            let _ = writeln!(
                out,
                "ADX: {:.2} (+DI {:.2}, -DI {:.2}), {}, quality {}",
                a.adx, a.dmp, a.dmn, a.strength, a.quality
            );
        }
        if let Some(i) = &self.ichimoku {
            let _ = writeln!(
                out,
                "Ichimoku: tenkan {:.2}, kijun {:.2}, span A {:.2}, span B {:.2}, {}",
                i.tenkan, i.kijun, i.span_a, i.span_b, i.cloud
            );
        }
        if let Some(s) = &self.supertrend {
            let signal = s.signal.unwrap_or(TrendSignal::Hold).name();
            let _ = writeln!(
                out,
                "SuperTrend: {:.2}, {}, distance {:.2}, {}, signal {}, {}",
                s.value, s.direction, s.price_distance, s.strength, signal, s.position_change
            );
        }
        if let Some(a) = &self.atr {
            let _ = writeln!(
                out,
                "ATR: {:.2}, {}, volatility {}, range {:.2}, movement {}",
                a.value, a.trend, a.volatility, a.price_range, a.movement
            );
        }
        if let Some(f) = &self.fibonacci {
            let levels: Vec<String> = f.levels.iter().map(|(n, v)| format!("{} {:.2}", n, v)).collect();
            let _ = writeln!(out, "Fibonacci: {}, {}, {}", levels.join(", "), f.position, f.nearest);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::indicators::{compute_frame, IndicatorConfig, IndicatorKind};
    use crate::types::Candle;

    fn create_uptrend_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 2000.0 + i as f64 * 2.0 + (i % 3) as f64;
                Candle::new(i as i64 * 7200, base, base + 3.0, base - 1.0, base + 2.0)
            })
            .collect()
    }

    #[test]
    fn test_summary_covers_selected_indicators() {
        let config = IndicatorConfig {
            selected: IndicatorKind::ALL.to_vec(),
            ..Default::default()
        };
        let frame = compute_frame(&create_uptrend_candles(80), &config);
        let summary = summarize(&frame, 79, 9, 21);

        assert!(summary.rsi.is_some());
        assert!(summary.macd.is_some());
        assert!(summary.ichimoku.is_some());
        assert!(summary.fibonacci.is_some());
        assert_eq!(summary.ema.as_ref().unwrap().trend, "Bullish");
        assert_eq!(summary.rsi.as_ref().unwrap().status, "Overbought");
        assert_eq!(
            summary.ichimoku.as_ref().unwrap().cloud,
            "Strong Bullish (Price Above Cloud)"
        );

        let text = summary.render();
        assert!(text.contains("RSI:"));
        assert!(text.contains("SuperTrend:"));
    }

    #[test]
    fn test_summary_skips_missing_indicators() {
        let config = IndicatorConfig {
            selected: vec![IndicatorKind::Rsi],
            ..Default::default()
        };
        let frame = compute_frame(&create_uptrend_candles(40), &config);
        let summary = summarize(&frame, 39, 9, 21);

        assert!(summary.rsi.is_some());
        assert!(summary.atr.is_some());
        assert!(summary.bollinger.is_some());
        assert!(summary.macd.is_none());
        assert!(summary.ichimoku.is_none());
        assert!(!summary.render().contains("MACD"));
    }

    #[test]
    fn test_summary_first_row_is_empty() {
        let frame = compute_frame(&create_uptrend_candles(40), &IndicatorConfig::default());
        assert_eq!(summarize(&frame, 0, 9, 21), IndicatorSummary::default());
    }
}
