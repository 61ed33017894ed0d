//! Aurum - gold (XAUUSD) technical analysis and prediction server

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

use axum::Router;
use config::Config;
use services::{
    AccountLedger, AnalysisRunner, AnalysisSettings, CsvCandleFeed, EconomicCalendar, LlmClient,
    PredictionJob, PredictionStore, Schedule, Scheduler,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub predictions: PredictionStore,
    pub tickers: PredictionStore,
    pub ledger: AccountLedger,
    pub calendar: Arc<EconomicCalendar>,
    pub runner: Arc<AnalysisRunner>,
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Wire services from configuration. Registers the prediction job when
    /// scheduling is enabled but does not start it.
    pub fn new(config: Config) -> error::Result<Self> {
        let storage = &config.storage;

        let calendar = match &storage.calendar_path {
            Some(path) => EconomicCalendar::from_json_file(path)?,
            None => EconomicCalendar::builtin()?,
        };

        let predictions = PredictionStore::new(&storage.prediction_dir);
        let settings = AnalysisSettings {
            symbol: config.symbol.clone(),
            timeframe: config.timeframe,
            candle_count: config.candle_count,
            prediction_prefix: storage.prediction_prefix.clone(),
            news_dir: storage.news_dir.clone(),
        };
        let mut runner = AnalysisRunner::new(
            Arc::new(CsvCandleFeed::new(&storage.candle_dir)),
            config.indicators.clone(),
            settings,
            predictions.clone(),
        );
        match LlmClient::new(config.llm.clone()) {
            Ok(client) => runner = runner.with_model(Arc::new(client)),
            Err(e) => warn!("Predictions disabled: {}", e),
        }
        let runner = Arc::new(runner);

        let scheduler = Arc::new(Scheduler::new(&config.scheduler));
        if config.scheduler.enabled {
            scheduler.add(
                Arc::new(PredictionJob::new(Arc::clone(&runner))),
                Schedule::HourlyAt {
                    minute: config.scheduler.minute,
                },
            );
        }

        info!(
            "Serving {} predictions from {}, {} calendar events",
            config.symbol,
            storage.prediction_dir.display(),
            calendar.len()
        );

        Ok(Self {
            tickers: PredictionStore::new(&storage.ticker_dir),
            ledger: AccountLedger::new(&storage.ledger_dir),
            calendar: Arc::new(calendar),
            config: Arc::new(config),
            predictions,
            runner,
            scheduler,
        })
    }
}

/// Build the HTTP application.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Re-export commonly used types
pub use error::{AppError, Result};
pub use types::*;
