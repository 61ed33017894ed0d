//! Technical indicator engine.
//!
//! Each indicator lives in its own module and implements [`Indicator`].
//! [`compute_frame`] runs the selected indicators over a candle series and
//! collects their columns into an [`IndicatorFrame`].

pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod fibonacci;
pub mod frame;
pub mod ichimoku;
pub mod macd;
pub mod rsi;
pub mod series;
pub mod stochastic;
pub mod supertrend;

pub use adx::Adx;
pub use atr::Atr;
pub use bollinger::BollingerBands;
pub use ema::Ema;
pub use fibonacci::Fibonacci;
pub use frame::{FrameRow, IndicatorFrame, IndicatorOutput, IndicatorStatus, TrendSignal};
pub use ichimoku::Ichimoku;
pub use macd::Macd;
pub use rsi::Rsi;
pub use stochastic::Stochastic;
pub use supertrend::SuperTrend;

use crate::error::IndicatorError;
use crate::types::Candle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Indicators known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IndicatorKind {
    Ema,
    Rsi,
    Macd,
    Stochastic,
    Adx,
    Supertrend,
    Ichimoku,
    Fibonacci,
    Bollinger,
    Atr,
}

impl IndicatorKind {
    pub const ALL: [IndicatorKind; 10] = [
        Self::Ema,
        Self::Rsi,
        Self::Macd,
        Self::Stochastic,
        Self::Adx,
        Self::Supertrend,
        Self::Ichimoku,
        Self::Fibonacci,
        Self::Bollinger,
        Self::Atr,
    ];

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "EMA" => Some(Self::Ema),
            "RSI" => Some(Self::Rsi),
            "MACD" => Some(Self::Macd),
            "STOCHASTIC" | "STOCH" => Some(Self::Stochastic),
            "ADX" => Some(Self::Adx),
            "SUPERTREND" => Some(Self::Supertrend),
            "ICHIMOKU" => Some(Self::Ichimoku),
            "FIBONACCI" | "FIB" => Some(Self::Fibonacci),
            "BOLLINGER" | "BB" => Some(Self::Bollinger),
            "ATR" => Some(Self::Atr),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ema => "EMA",
            Self::Rsi => "RSI",
            Self::Macd => "MACD",
            Self::Stochastic => "STOCHASTIC",
            Self::Adx => "ADX",
            Self::Supertrend => "SUPERTREND",
            Self::Ichimoku => "ICHIMOKU",
            Self::Fibonacci => "FIBONACCI",
            Self::Bollinger => "BOLLINGER",
            Self::Atr => "ATR",
        }
    }

    /// ATR feeds the pattern analyzer and Bollinger feeds the summary, so
    /// both run whether or not they were selected.
    pub fn always_computed(&self) -> bool {
        matches!(self, Self::Atr | Self::Bollinger)
    }
}

/// Trait for frame-producing indicators.
pub trait Indicator: Send + Sync {
    fn kind(&self) -> IndicatorKind;

    /// Human-readable name with parameters.
    fn name(&self) -> String;

    /// Minimum candles required for at least one defined value.
    fn min_periods(&self) -> usize;

    /// Compute this indicator's columns over the full candle series.
    fn compute(&self, candles: &[Candle]) -> Result<IndicatorOutput, IndicatorError>;
}

/// Fail with `InsufficientData` when the series is shorter than `required`.
pub(crate) fn require_candles(
    indicator: &'static str,
    required: usize,
    candles: &[Candle],
) -> Result<(), IndicatorError> {
    if candles.len() < required {
        return Err(IndicatorError::InsufficientData {
            indicator,
            required,
            available: candles.len(),
        });
    }
    Ok(())
}

/// Fail with `InvalidParameter` for a zero period.
pub(crate) fn require_period(indicator: &'static str, period: usize) -> Result<(), IndicatorError> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter {
            indicator,
            reason: "period must be positive".to_string(),
        });
    }
    Ok(())
}

/// Which indicators to run and with what parameters.
#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    pub selected: Vec<IndicatorKind>,
    pub ema: Ema,
    pub rsi: Rsi,
    pub macd: Macd,
    pub stochastic: Stochastic,
    pub adx: Adx,
    pub supertrend: SuperTrend,
    pub ichimoku: Ichimoku,
    pub fibonacci: Fibonacci,
    pub bollinger: BollingerBands,
    pub atr: Atr,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            selected: vec![
                IndicatorKind::Ema,
                IndicatorKind::Rsi,
                IndicatorKind::Macd,
                IndicatorKind::Stochastic,
                IndicatorKind::Adx,
                IndicatorKind::Supertrend,
                IndicatorKind::Ichimoku,
                IndicatorKind::Fibonacci,
            ],
            ema: Ema::default(),
            rsi: Rsi::default(),
            macd: Macd::default(),
            stochastic: Stochastic::default(),
            adx: Adx::default(),
            supertrend: SuperTrend::default(),
            ichimoku: Ichimoku::default(),
            fibonacci: Fibonacci::default(),
            bollinger: BollingerBands::default(),
            atr: Atr::default(),
        }
    }
}

impl IndicatorConfig {
    /// Parse a comma-separated selection such as `"EMA,RSI,SUPERTREND"`.
    /// Unknown names are logged and skipped.
    pub fn parse_selection(s: &str) -> Vec<IndicatorKind> {
        s.split(',')
            .filter(|part| !part.trim().is_empty())
            .filter_map(|part| {
                let kind = IndicatorKind::from_str(part);
                if kind.is_none() {
                    warn!("Unknown indicator in selection: {}", part.trim());
                }
                kind
            })
            .collect()
    }

    pub fn is_selected(&self, kind: IndicatorKind) -> bool {
        kind.always_computed() || self.selected.contains(&kind)
    }

    /// Dispatch table from kind to a configured indicator.
    pub fn registry(&self) -> BTreeMap<IndicatorKind, Box<dyn Indicator>> {
        let mut table: BTreeMap<IndicatorKind, Box<dyn Indicator>> = BTreeMap::new();
        table.insert(IndicatorKind::Ema, Box::new(self.ema.clone()));
        table.insert(IndicatorKind::Rsi, Box::new(self.rsi.clone()));
        table.insert(IndicatorKind::Macd, Box::new(self.macd.clone()));
        table.insert(IndicatorKind::Stochastic, Box::new(self.stochastic.clone()));
        table.insert(IndicatorKind::Adx, Box::new(self.adx.clone()));
        table.insert(IndicatorKind::Supertrend, Box::new(self.supertrend.clone()));
        table.insert(IndicatorKind::Ichimoku, Box::new(self.ichimoku.clone()));
        table.insert(IndicatorKind::Fibonacci, Box::new(self.fibonacci.clone()));
        table.insert(IndicatorKind::Bollinger, Box::new(self.bollinger.clone()));
        table.insert(IndicatorKind::Atr, Box::new(self.atr.clone()));
        table
    }
}

/// Compute every requested indicator over `candles`.
///
/// A failing indicator is logged and recorded as [`IndicatorStatus::Failed`];
/// the others still run. Gaps are filled once all indicators are in.
pub fn compute_frame(candles: &[Candle], config: &IndicatorConfig) -> IndicatorFrame {
    let mut frame = IndicatorFrame::new(candles.to_vec());

    for (kind, indicator) in config.registry() {
        if !config.is_selected(kind) {
            frame.set_status(kind, IndicatorStatus::NotRequested);
            continue;
        }

        match indicator.compute(candles) {
            Ok(output) => {
                debug!("Computed {} over {} candles", indicator.name(), candles.len());
                frame.merge(output);
                frame.set_status(kind, IndicatorStatus::Computed);
            }
            Err(e) => {
                warn!("Failed to compute {}: {}", indicator.name(), e);
                frame.set_status(kind, IndicatorStatus::Failed(e.to_string()));
            }
        }
    }

    frame.fill_gaps();
    frame
}
