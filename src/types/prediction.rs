use serde::{Deserialize, Serialize};

/// Direction of the predicted next candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendCall {
    Buy,
    Sell,
}

impl TrendCall {
    /// Parse from string, case-insensitive. Accepts the common long/short synonyms.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '*').to_lowercase().as_str() {
            "buy" | "long" | "bullish" | "up" => Some(Self::Buy),
            "sell" | "short" | "bearish" | "down" => Some(Self::Sell),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Structured prediction persisted after a model call.
///
/// Key names match the files consumed by existing clients, including the
/// capitalized level keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub next_candle_trend: TrendCall,
    /// Integer percentage, 0..=100.
    pub confidence_level: u8,
    #[serde(default)]
    pub key_factors: String,
    #[serde(rename = "Resistance_level", default, skip_serializing_if = "Option::is_none")]
    pub resistance_level: Option<f64>,
    #[serde(rename = "Support_level", default, skip_serializing_if = "Option::is_none")]
    pub support_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_term_target: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medium_term_target: Option<f64>,
    /// Time the record was produced, `YYYY-MM-DD HH:MM:SS`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}
