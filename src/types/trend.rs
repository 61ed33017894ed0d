use serde::{Deserialize, Serialize};

/// Directional reading of a single indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SignalBias {
    Bullish,
    Bearish,
    #[default]
    Neutral,
}

impl SignalBias {
    /// Get display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bullish => "Bullish",
            Self::Bearish => "Bearish",
            Self::Neutral => "Neutral",
        }
    }
}

/// Ichimoku reading, which carries strength as well as direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IchimokuBias {
    StrongBullish,
    Bullish,
    #[default]
    Neutral,
    Bearish,
    StrongBearish,
}

impl IchimokuBias {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StrongBullish => "Strong Bullish",
            Self::Bullish => "Bullish",
            Self::Neutral => "Neutral",
            Self::Bearish => "Bearish",
            Self::StrongBearish => "Strong Bearish",
        }
    }
}

/// Overall trend label derived from the weighted trend points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendLabel {
    #[serde(rename = "Strong Bullish")]
    StrongBullish,
    #[serde(rename = "Bullish")]
    Bullish,
    #[serde(rename = "Weak Bullish")]
    WeakBullish,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Weak Bearish")]
    WeakBearish,
    #[serde(rename = "Bearish")]
    Bearish,
    #[serde(rename = "Strong Bearish")]
    StrongBearish,
}

impl TrendLabel {
    /// Map trend points to a label.
    ///
    /// Thresholds: >= 3 strong bullish, >= 1.5 bullish, > 0 weak bullish,
    /// == 0 neutral, > -1.5 weak bearish, > -3 bearish, otherwise strong bearish.
    pub fn from_points(points: f64) -> Self {
        if points >= 3.0 {
            Self::StrongBullish
        } else if points >= 1.5 {
            Self::Bullish
        } else if points > 0.0 {
            Self::WeakBullish
        } else if points == 0.0 {
            Self::Neutral
        } else if points > -1.5 {
            Self::WeakBearish
        } else if points > -3.0 {
            Self::Bearish
        } else {
            Self::StrongBearish
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StrongBullish => "Strong Bullish",
            Self::Bullish => "Bullish",
            Self::WeakBullish => "Weak Bullish",
            Self::Neutral => "Neutral",
            Self::WeakBearish => "Weak Bearish",
            Self::Bearish => "Bearish",
            Self::StrongBearish => "Strong Bearish",
        }
    }

    /// Label with the "Trend" suffix used in rendered text ("Neutral" stays bare).
    pub fn headline(&self) -> String {
        match self {
            Self::Neutral => "Neutral".to_string(),
            other => format!("{} Trend", other.name()),
        }
    }
}

/// The per-indicator readings that fed a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContributingSignals {
    pub ema: SignalBias,
    pub ichimoku: IchimokuBias,
    pub macd: SignalBias,
}

/// Weighted trend verdict for the latest candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendVerdict {
    pub label: TrendLabel,
    /// Sum of the weighted indicator contributions.
    pub score: f64,
    pub contributing_signals: ContributingSignals,
    pub close: f64,
    /// Close minus previous close.
    pub change: f64,
    pub change_pct: f64,
}

impl std::fmt::Display for TrendVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}. Current Price: {:.2}, Change: {:.2} ({:.2}%)",
            self.label.headline(),
            self.close,
            self.change,
            self.change_pct
        )
    }
}
