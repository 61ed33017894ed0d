pub mod analysis;
pub mod health;
pub mod prediction;

use crate::AppState;
use axum::Router;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(prediction::router())
        .nest("/api/analysis", analysis::router())
}
