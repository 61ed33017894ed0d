//! Integration tests for reply parsing and prediction persistence

use aurum::error::ParseError;
use aurum::services::prediction::{parse_reply, PredictionStore};
use aurum::types::TrendCall;
use chrono::NaiveDate;

const JSON_REPLY: &str = r#"<think>
Price is above both EMAs; RSI is neutral. {"draft": true}
</think>
```json
{
  "next_candle_trend": "buy",
  "confidence_level": "74%",
  "key_factors": "Holding above the cloud with a rising MACD histogram",
  "Resistance_level": "$2,668.40",
  "Support_level": 2641.1,
  "short_term_target": 2660,
  "medium_term_target": "[2685.00]"
}
```"#;

const NUMBERED_REPLY: &str = "Based on the indicators:\n\
    1. Next candle trend: BUY\n\
    2. Confidence level: 74%\n\
    3. Key factors: Holding above the cloud with a rising MACD histogram\n\
    4. Resistance level (USD): [2668.40]\n\
    5. Support level (USD): [2641.10]\n\
    6. Short-term target price (USD): [2660.00]\n\
    7. Medium-term target price (USD): [2685.00]\n";

#[test]
fn test_json_and_numbered_replies_match() {
    let from_json = parse_reply(JSON_REPLY).unwrap();
    let from_list = parse_reply(NUMBERED_REPLY).unwrap();

    assert_eq!(from_json, from_list);
    assert_eq!(from_json.next_candle_trend, TrendCall::Buy);
    assert_eq!(from_json.confidence_level, 74);
    assert_eq!(from_json.resistance_level, Some(2668.4));
    assert_eq!(from_json.medium_term_target, Some(2685.0));
}

#[test]
fn test_identical_records_persist_identically() {
    let dir = tempfile::tempdir().unwrap();
    let store = PredictionStore::new(dir.path());
    let at = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap().and_hms_opt(9, 16, 0).unwrap();

    let a = store.save("json_", &parse_reply(JSON_REPLY).unwrap(), at).unwrap();
    let b = store.save("list_", &parse_reply(NUMBERED_REPLY).unwrap(), at).unwrap();

    assert_eq!(std::fs::read_to_string(a).unwrap(), std::fs::read_to_string(b).unwrap());
}

#[test]
fn test_bare_json_reply() {
    let reply = r#"{"next_candle_trend":"SELL","confidence_level":58,"key_factors":"Bearish cross"}"#;
    let record = parse_reply(reply).unwrap();
    assert_eq!(record.next_candle_trend, TrendCall::Sell);
    assert_eq!(record.key_factors, "Bearish cross");
    assert_eq!(record.support_level, None);
}

#[test]
fn test_unstructured_reply_fails() {
    let reply = "Gold may move either way depending on the Fed.";
    assert_eq!(parse_reply(reply), Err(ParseError::NoStructuredData));
}

#[test]
fn test_latest_prefers_newest_file() {
    let dir = tempfile::tempdir().unwrap();
    let store = PredictionStore::new(dir.path());
    let record = parse_reply(NUMBERED_REPLY).unwrap();
    let day = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

    store.save("ppx_re_", &record, day.and_hms_opt(9, 16, 0).unwrap()).unwrap();
    let newest = store.save("ppx_re_", &record, day.and_hms_opt(11, 16, 0).unwrap()).unwrap();

    // Identical mtimes fall back to name order, which is chronological.
    assert_eq!(store.latest_path("ppx_re_").unwrap(), Some(newest));
}
