//! Economic calendar lookups for the prediction API.
//!
//! The calendar is a static table of UTC release times. Lookups return the
//! closest release within the next 48 hours, formatted for US/Eastern and
//! Asia/Seoul readers.

use crate::error::{AppError, Result};
use crate::types::{EconomicEvent, NextEconomicEvent};
use chrono::{DateTime, Duration, Utc};
use chrono_tz::{Asia::Seoul, US::Eastern};
use std::path::Path;
use tracing::{debug, info};

const BUILTIN_CALENDAR: &str = include_str!("../../data/economic_calendar.json");

/// Look-ahead window for the next event.
pub const LOOKAHEAD_HOURS: i64 = 48;

/// Key under which the event block is injected into prediction JSON.
pub const EVENT_KEY: &str = "next_economic_event";

/// Sorted table of upcoming releases.
#[derive(Debug, Clone, Default)]
pub struct EconomicCalendar {
    events: Vec<EconomicEvent>,
}

impl EconomicCalendar {
    pub fn new(mut events: Vec<EconomicEvent>) -> Self {
        events.sort_by_key(|e| e.time);
        Self { events }
    }

    /// Calendar bundled with the binary.
    pub fn builtin() -> Result<Self> {
        let events: Vec<EconomicEvent> = serde_json::from_str(BUILTIN_CALENDAR)?;
        Ok(Self::new(events))
    }

    /// Load a calendar from a JSON array of events.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AppError::Internal(format!("reading calendar {}: {}", path.display(), e)))?;
        let events: Vec<EconomicEvent> = serde_json::from_str(&text)?;
        info!("Loaded {} economic events from {}", events.len(), path.display());
        Ok(Self::new(events))
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Closest event strictly after `now` and no later than `now + 48h`.
    pub fn next_event(&self, now: DateTime<Utc>) -> Option<&EconomicEvent> {
        let horizon = now + Duration::hours(LOOKAHEAD_HOURS);
        self.events
            .iter()
            .filter(|e| e.time > now && e.time <= horizon)
            .min_by_key(|e| e.time)
    }

    /// Formatted block for the next event, or the `N/A` block.
    pub fn next_event_block(&self, now: DateTime<Utc>) -> NextEconomicEvent {
        match self.next_event(now) {
            Some(event) => {
                debug!("Next economic event: {} at {}", event.event_en, event.time);
                format_event(event)
            }
            None => {
                debug!("No economic events within {}h of {}", LOOKAHEAD_HOURS, now);
                no_event()
            }
        }
    }

    /// Insert the next-event block into a JSON object.
    ///
    /// Non-object values are left untouched.
    pub fn inject(&self, value: &mut serde_json::Value, now: DateTime<Utc>) -> Result<()> {
        if let Some(map) = value.as_object_mut() {
            let block = serde_json::to_value(self.next_event_block(now))?;
            map.insert(EVENT_KEY.to_string(), block);
        }
        Ok(())
    }
}

fn format_event(event: &EconomicEvent) -> NextEconomicEvent {
    let eastern = event.time.with_timezone(&Eastern);
    let seoul = event.time.with_timezone(&Seoul);

    NextEconomicEvent {
        us_date: eastern.format("%Y-%m-%d").to_string(),
        us_time: eastern.format("%I:%M %p").to_string(),
        kr_date: seoul.format("%Y-%m-%d").to_string(),
        kr_time: seoul.format("%H:%M").to_string(),
        event_en: event.event_en.clone(),
        event_kr: event.event_kr.clone(),
        importance: event.importance,
    }
}

fn no_event() -> NextEconomicEvent {
    let na = || "N/A".to_string();
    NextEconomicEvent {
        us_date: na(),
        us_time: na(),
        kr_date: na(),
        kr_time: na(),
        event_en: "No upcoming economic events within 48 hours".to_string(),
        event_kr: "48시간 내 예정된 경제 이벤트 없음".to_string(),
        importance: 0,
    }
}
