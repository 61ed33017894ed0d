//! On-demand analysis and scheduler status.

use crate::error::Result;
use crate::services::analysis::AnalysisSnapshot;
use crate::services::scheduler::{JobEvent, JobStatus};
use crate::AppState;
use axum::{extract::State, routing::get, Json, Router};
use chrono::{Local, Utc};
use serde::Serialize;

#[derive(Serialize)]
pub struct SchedulerResponse {
    pub enabled: bool,
    pub jobs: Vec<JobStatus>,
    pub history: Vec<JobEvent>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_analysis))
        .route("/jobs", get(get_jobs))
}

/// Compute the current technical snapshot from the candle feed.
async fn get_analysis(State(state): State<AppState>) -> Result<Json<AnalysisSnapshot>> {
    let runner = state.runner.clone();
    let snapshot = tokio::task::spawn_blocking(move || runner.analyze(Utc::now()))
        .await
        .map_err(|e| crate::error::AppError::Internal(e.to_string()))??;
    Ok(Json(snapshot))
}

async fn get_jobs(State(state): State<AppState>) -> Json<SchedulerResponse> {
    Json(SchedulerResponse {
        enabled: state.config.scheduler.enabled,
        jobs: state.scheduler.statuses(Local::now().naive_local()),
        history: state.scheduler.history().recent(20).await,
    })
}
