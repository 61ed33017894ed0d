//! Router tests for the prediction, ticker and health endpoints

use aurum::config::{Config, StorageConfig};
use aurum::{app, AppState};
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::path::Path;
use tempfile::TempDir;
use tower::ServiceExt;

struct TestEnv {
    root: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self, sub: &str) -> std::path::PathBuf {
        self.root.path().join(sub)
    }

    fn state(&self) -> AppState {
        let config = Config {
            storage: StorageConfig {
                prediction_dir: self.path("ppx"),
                ticker_dir: self.path("json"),
                ledger_dir: self.path("account"),
                candle_dir: self.path("candles"),
                ..Default::default()
            },
            ..Default::default()
        };
        AppState::new(config).unwrap()
    }
}

fn write_json(dir: &Path, name: &str, value: &Value) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(dir.join(name), serde_json::to_string(value).unwrap()).unwrap();
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    let response = app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let env = TestEnv::new();
    let (status, body) = get(env.state(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["symbol"], "XAUUSD");
}

#[tokio::test]
async fn test_xau_returns_latest_with_event_and_logs_account() {
    let env = TestEnv::new();
    write_json(
        &env.path("ppx"),
        "ppx_re_20250602_0900.json",
        &json!({"next_candle_trend": "BUY", "confidence_level": 71}),
    );

    let (status, body) = get(env.state(), "/api/xau/?account=771100&balance=5000&nickname=lee").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["next_candle_trend"], "BUY");
    assert!(body["next_economic_event"]["event_en"].is_string());

    let months: Vec<_> = std::fs::read_dir(env.path("account")).unwrap().collect();
    assert_eq!(months.len(), 1);
    let month_dir = months.into_iter().next().unwrap().unwrap().path();
    let ledger = std::fs::read_to_string(month_dir.join("771100.csv")).unwrap();
    assert!(ledger.starts_with("date,time,balance"));
    assert!(ledger.contains(",5000,"));
}

#[tokio::test]
async fn test_xau_without_prediction_returns_default_error() {
    let env = TestEnv::new();
    let (status, body) = get(env.state(), "/api/xau/").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({
            "next_candle_trend": "",
            "confidence_level": 44,
            "key_factors": "Error",
            "timestamp": "",
            "Resistance_level": "",
            "Support_level": ""
        })
    );
}

#[tokio::test]
async fn test_ticker_languages() {
    let env = TestEnv::new();
    let dir = env.path("json");
    write_json(&dir, "XAUUSD_20250602_091600.json", &json!({"lang": "ko"}));
    write_json(&dir, "en_XAUUSD_20250602_091600.json", &json!({"lang": "en"}));
    write_json(&dir, "all_XAUUSD_20250602_091600.json", &json!({"lang": "all"}));

    let (status, body) = get(env.state(), "/api/ticker/?h_tic=xauusd&lang=en").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lang"], "en");

    let (status, body) = get(env.state(), "/api/ticker/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lang"], "ko");

    let (status, body) = get(env.state(), "/api/ticker/?h_tic=BTCUSD&lang=jp").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["symbol"], "BTCUSD");
    assert_eq!(body["lang"], "jp");
}

#[tokio::test]
async fn test_analysis_without_candles_is_unavailable() {
    let env = TestEnv::new();
    let (status, body) = get(env.state(), "/api/analysis").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
}

#[tokio::test]
async fn test_jobs_endpoint() {
    let env = TestEnv::new();
    let (status, body) = get(env.state(), "/api/analysis/jobs").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);
    assert!(body["jobs"].as_array().unwrap().is_empty());
}
