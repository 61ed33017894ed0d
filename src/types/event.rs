use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scheduled macro-economic release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicEvent {
    /// Release time in UTC.
    pub time: DateTime<Utc>,
    pub event_en: String,
    #[serde(default)]
    pub event_kr: String,
    /// 1 (low) to 3 (high).
    pub importance: u8,
}

/// Serialized "next economic event" block injected into prediction responses.
///
/// When nothing is scheduled inside the look-ahead window every date and
/// time field holds `N/A`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextEconomicEvent {
    pub us_date: String,
    pub us_time: String,
    pub kr_date: String,
    pub kr_time: String,
    pub event_en: String,
    pub event_kr: String,
    pub importance: u8,
}
