//! Prediction endpoints polled by trading clients.
//!
//! - `GET /api/xau/` records the caller's account telemetry and returns the
//!   latest stored prediction with the next economic event attached.
//! - `GET /api/ticker/` returns the latest ticker analysis for a symbol and
//!   language.

use crate::error::{AppError, Result};
use crate::services::ledger::AccountTelemetry;
use crate::services::prediction::{ticker_lang, ticker_prefix};
use crate::AppState;
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Local, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::{debug, error, warn};

/// Body returned whenever the prediction endpoint cannot serve a record.
pub fn default_error_body() -> Value {
    json!({
        "next_candle_trend": "",
        "confidence_level": 44,
        "key_factors": "Error",
        "timestamp": "",
        "Resistance_level": "",
        "Support_level": "",
    })
}

#[derive(Debug, Deserialize)]
pub struct TickerQuery {
    pub h_tic: Option<String>,
    pub lang: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/xau/", get(get_prediction))
        .route("/api/ticker/", get(get_ticker))
}

/// Caller address, preferring the first `X-Forwarded-For` hop.
fn client_ip(headers: &HeaderMap, connect: Option<ConnectInfo<SocketAddr>>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| connect.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_default()
}

async fn latest_prediction(
    state: &AppState,
    ip: String,
    telemetry: AccountTelemetry,
    now: DateTime<Utc>,
) -> Result<Value> {
    state
        .ledger
        .record(ip, now.with_timezone(&Local).naive_local(), telemetry)
        .await?;

    let prefix = state.config.storage.prediction_prefix.clone();
    let store = state.predictions.clone();
    let latest = tokio::task::spawn_blocking(move || store.load_latest(&prefix))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    let mut value = latest.ok_or_else(|| {
        AppError::NotFound(format!("no {} prediction file", state.config.storage.prediction_prefix))
    })?;

    // A calendar problem must not hide the prediction.
    if let Err(e) = state.calendar.inject(&mut value, now) {
        warn!("Failed to attach economic event: {}", e);
    }

    Ok(value)
}

async fn get_prediction(
    State(state): State<AppState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(telemetry): Query<AccountTelemetry>,
) -> Response {
    let ip = client_ip(&headers, connect);
    debug!("Prediction request from {} (account {:?})", ip, telemetry.account);

    match latest_prediction(&state, ip, telemetry, Utc::now()).await {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(e) => {
            error!("Prediction request failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(default_error_body())).into_response()
        }
    }
}

async fn get_ticker(State(state): State<AppState>, Query(query): Query<TickerQuery>) -> Response {
    let symbol = query
        .h_tic
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("XAUUSD")
        .to_uppercase();
    let lang = ticker_lang(query.lang.as_deref().unwrap_or("ko"));

    match state.tickers.load_latest(&ticker_prefix(&symbol, lang)) {
        Ok(Some(value)) => (StatusCode::OK, Json(value)).into_response(),
        Ok(None) => {
            let message = format!("No ticker file for {} ({})", symbol, lang);
            warn!("{}", message);
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": message, "symbol": symbol, "lang": lang })),
            )
                .into_response()
        }
        Err(e) => {
            error!("Ticker request failed for {}: {}", symbol, e);
            e.into_response()
        }
    }
}
