use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    /// The candle feed returned nothing for a run.
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Errors raised while computing a single indicator or reading frame columns.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndicatorError {
    #[error("{indicator} needs {required} candles, got {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("invalid parameter for {indicator}: {reason}")]
    InvalidParameter {
        indicator: &'static str,
        reason: String,
    },

    #[error("missing column (tried {candidates:?})")]
    MissingColumn { candidates: Vec<String> },

    #[error("{column} is still warming up at row {index}")]
    WarmUp { column: String, index: usize },
}

/// Errors raised while turning a model reply into a prediction record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("no structured data found in reply")]
    NoStructuredData,

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::UpstreamUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Indicator(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            AppError::Parse(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Csv(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Reqwest(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::SerdeJson(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Anyhow(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_error_message() {
        let err = IndicatorError::InsufficientData {
            indicator: "ADX",
            required: 28,
            available: 10,
        };
        assert_eq!(err.to_string(), "ADX needs 28 candles, got 10");
    }

    #[test]
    fn test_status_codes() {
        let resp = AppError::NotFound("x".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::UpstreamUnavailable("feed".into()).into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let resp = AppError::from(ParseError::NoStructuredData).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
