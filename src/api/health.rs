use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    symbol: String,
    timeframe: String,
    /// Whether a prediction file is available to serve.
    prediction_ready: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let prediction_ready = state
        .predictions
        .latest_path(&state.config.storage.prediction_prefix)
        .map(|p| p.is_some())
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        symbol: state.config.symbol.clone(),
        timeframe: state.config.timeframe.name().to_string(),
        prediction_ready,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/api/health", get(health))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, StorageConfig};

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "ok",
            version: "1.0.0",
            symbol: "XAUUSD".to_string(),
            timeframe: "H2".to_string(),
            prediction_ready: false,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"version\":\"1.0.0\""));
        assert!(json.contains("\"prediction_ready\":false"));
    }

    #[tokio::test]
    async fn test_health_handler() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            storage: StorageConfig {
                prediction_dir: dir.path().to_path_buf(),
                ..Default::default()
            },
            ..Default::default()
        };
        let state = AppState::new(config).unwrap();

        let Json(response) = health(State(state)).await;
        assert_eq!(response.status, "ok");
        assert_eq!(response.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(response.symbol, "XAUUSD");
        assert!(!response.prediction_ready);
    }
}
