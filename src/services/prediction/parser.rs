//! Turns free-text model replies into [`PredictionRecord`]s.
//!
//! Replies come either as a JSON object (bare, fenced, or embedded in prose)
//! or as the numbered `N. Label: value` block the prompt asks for. Both go
//! through the same field table so identical values give identical records.

use crate::error::ParseError;
use crate::types::{PredictionRecord, TrendCall};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Record fields, keyed by normalized label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Field {
    Trend,
    Confidence,
    KeyFactors,
    Resistance,
    Support,
    ShortTermTarget,
    MediumTermTarget,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Self::Trend,
        Self::Confidence,
        Self::KeyFactors,
        Self::Resistance,
        Self::Support,
        Self::ShortTermTarget,
        Self::MediumTermTarget,
    ];

    /// Exact match on the persisted key, ignoring case and separators, so
    /// `Next candle trend` and `NEXT_CANDLE_TREND` both hit.
    pub fn from_key(key: &str) -> Option<Self> {
        let key: String = key
            .trim()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        let key = key.trim_matches('_');
        Self::ALL.into_iter().find(|f| f.key().eq_ignore_ascii_case(key))
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Trend => "next_candle_trend",
            Self::Confidence => "confidence_level",
            Self::KeyFactors => "key_factors",
            Self::Resistance => "Resistance_level",
            Self::Support => "Support_level",
            Self::ShortTermTarget => "short_term_target",
            Self::MediumTermTarget => "medium_term_target",
        }
    }
}

/// Map a list label to a field by alias.
///
/// Checks run from most to least specific so "Short-term target price" is
/// not mistaken for a trend and "Resistance level (USD)" maps to resistance.
pub fn normalize_key(label: &str) -> Option<Field> {
    classify(label, true)
}

/// Map a JSON key to a field by alias. A bare `signal` is not a trend here:
/// objects routinely carry indicator keys such as `macd_signal`.
pub fn normalize_json_key(key: &str) -> Option<Field> {
    classify(key, false)
}

fn classify(label: &str, signal_is_trend: bool) -> Option<Field> {
    let label: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { ' ' })
        .collect();
    let words: Vec<&str> = label.split_whitespace().collect();
    let has = |w: &str| words.iter().any(|x| x.starts_with(w));

    if has("confidence") {
        Some(Field::Confidence)
    } else if has("factor") || (has("key") && has("reason")) {
        Some(Field::KeyFactors)
    } else if has("resistance") {
        Some(Field::Resistance)
    } else if has("support") {
        Some(Field::Support)
    } else if has("short") && has("target") {
        Some(Field::ShortTermTarget)
    } else if has("medium") && has("target") {
        Some(Field::MediumTermTarget)
    } else if has("trend") || has("direction") || (signal_is_trend && has("signal")) {
        Some(Field::Trend)
    } else {
        None
    }
}

/// Drop any reasoning preamble up to the last closing `</think>` tag.
fn strip_reasoning(text: &str) -> &str {
    match text.rfind("</think>") {
        Some(pos) => text[pos + "</think>".len()..].trim(),
        None => text.trim(),
    }
}

/// Contents of the first ```json fenced block, if any.
fn fenced_json(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// Every balanced `{...}` span in the text, outermost first, in order.
fn balanced_objects(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }

        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut end = None;

        for (j, &b) in bytes.iter().enumerate().skip(i) {
            if in_string {
                match b {
                    _ if escaped => escaped = false,
                    b'\\' => escaped = true,
                    b'"' => in_string = false,
                    _ => {}
                }
                continue;
            }
            match b {
                b'"' => in_string = true,
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        end = Some(j);
                        break;
                    }
                }
                _ => {}
            }
        }

        match end {
            Some(j) => {
                spans.push(&text[i..=j]);
                i = j + 1;
            }
            None => break,
        }
    }

    spans
}

fn as_object(candidate: &str) -> Option<serde_json::Map<String, Value>> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Locate a JSON object in a reply: the whole text, a fenced block, then the
/// first embedded object that parses (objects carrying a trend key win).
pub fn extract_json(text: &str) -> Option<serde_json::Map<String, Value>> {
    let text = strip_reasoning(text);

    if let Some(map) = as_object(text) {
        return Some(map);
    }
    if let Some(map) = fenced_json(text).and_then(as_object) {
        return Some(map);
    }

    let objects: Vec<_> = balanced_objects(text).into_iter().filter_map(as_object).collect();
    let with_trend = objects
        .iter()
        .position(|m| m.keys().any(|k| normalize_json_key(k) == Some(Field::Trend)));
    match with_trend {
        Some(i) => objects.into_iter().nth(i),
        None => objects.into_iter().next(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) if items.len() == 1 => value_text(&items[0]),
        other => other.to_string(),
    }
}

/// Assign labelled values to fields. Exact key matches claim their field
/// first; aliases only fill fields that are still empty. Within each pass the
/// first occurrence wins.
fn assign_fields<'a, I>(pairs: I, alias: fn(&str) -> Option<Field>) -> BTreeMap<Field, String>
where
    I: IntoIterator<Item = (&'a str, String)> + Clone,
{
    let mut fields = BTreeMap::new();

    for (label, value) in pairs.clone() {
        if let Some(field) = Field::from_key(label) {
            fields.entry(field).or_insert(value);
        }
    }
    for (label, value) in pairs {
        if Field::from_key(label).is_some() {
            continue;
        }
        if let Some(field) = alias(label) {
            fields.entry(field).or_insert(value);
        }
    }

    fields
}

fn json_fields(object: &serde_json::Map<String, Value>) -> BTreeMap<Field, String> {
    let pairs: Vec<(&str, String)> = object
        .iter()
        .map(|(key, value)| (key.as_str(), value_text(value)))
        .collect();
    assign_fields(pairs, normalize_json_key)
}

/// Collect `Label: value` lines, with or without list numbering or markdown.
fn salvage_lines(text: &str) -> BTreeMap<Field, String> {
    let mut pairs: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*', '#', '>', ' ']);
        let line = line.trim_start_matches(|c: char| c.is_ascii_digit());
        let line = line.trim_start_matches(['.', ')', ' ']);

        let Some((label, value)) = line.split_once(':') else {
            continue;
        };
        let label = label.replace("**", "");
        let value = value.trim().trim_matches('*').trim();
        if value.is_empty() {
            continue;
        }

        pairs.push((label.trim().to_string(), value.to_string()));
    }

    assign_fields(
        pairs.iter().map(|(label, value)| (label.as_str(), value.clone())),
        normalize_key,
    )
}

/// First number in a value, ignoring currency symbols, brackets and thousands separators.
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let start = cleaned.find(|c: char| c.is_ascii_digit())?;
    let negative = cleaned[..start].ends_with('-');

    let number: String = cleaned[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = number.trim_end_matches('.').parse().ok()?;
    Some(if negative { -value } else { value })
}

/// Confidence as an integer percentage. Fractions such as `0.76` are scaled up.
pub fn parse_percent(raw: &str) -> Option<u8> {
    let mut value = parse_number(raw)?;
    if value > 0.0 && value < 1.0 && !raw.contains('%') {
        value *= 100.0;
    }
    let rounded = value.round();
    if (0.0..=100.0).contains(&rounded) {
        Some(rounded as u8)
    } else {
        None
    }
}

fn from_fields(fields: &BTreeMap<Field, String>) -> Result<PredictionRecord, ParseError> {
    let trend_raw = fields
        .get(&Field::Trend)
        .ok_or(ParseError::MissingField(Field::Trend.key()))?;
    let next_candle_trend = TrendCall::from_str(trend_raw)
        .or_else(|| {
            // Labels like "BUY (bullish continuation)"
            trend_raw
                .split(|c: char| !c.is_ascii_alphabetic())
                .find_map(TrendCall::from_str)
        })
        .ok_or_else(|| ParseError::InvalidField {
            field: Field::Trend.key(),
            value: trend_raw.clone(),
        })?;

    let confidence_raw = fields
        .get(&Field::Confidence)
        .ok_or(ParseError::MissingField(Field::Confidence.key()))?;
    let confidence_level = parse_percent(confidence_raw).ok_or_else(|| ParseError::InvalidField {
        field: Field::Confidence.key(),
        value: confidence_raw.clone(),
    })?;

    let price = |field: Field| -> Option<f64> {
        let raw = fields.get(&field)?;
        let value = parse_number(raw);
        if value.is_none() {
            debug!("Ignoring unparseable {}: {}", field.key(), raw);
        }
        value
    };

    Ok(PredictionRecord {
        next_candle_trend,
        confidence_level,
        key_factors: fields
            .get(&Field::KeyFactors)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
        resistance_level: price(Field::Resistance),
        support_level: price(Field::Support),
        short_term_target: price(Field::ShortTermTarget),
        medium_term_target: price(Field::MediumTermTarget),
        timestamp: None,
    })
}

/// Parse a model reply into a prediction record.
pub fn parse_reply(text: &str) -> Result<PredictionRecord, ParseError> {
    if let Some(object) = extract_json(text) {
        let fields = json_fields(&object);
        if fields.contains_key(&Field::Trend) {
            return from_fields(&fields);
        }
        debug!("JSON object in reply has no trend key, falling back to line salvage");
    }

    let fields = salvage_lines(strip_reasoning(text));
    if !fields.contains_key(&Field::Trend) || !fields.contains_key(&Field::Confidence) {
        return Err(ParseError::NoStructuredData);
    }
    from_fields(&fields)
}
