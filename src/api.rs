use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::models::{LatestAnswer, LatestAnswers};
use crate::state::{AggregationState, StateView};

pub fn router(state: Arc<AggregationState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(get_state))
        .route("/api/answers", get(get_latest_answers))
        .route("/api/answers/:symbol", get(get_latest_answer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn get_state(State(state): State<Arc<AggregationState>>) -> Json<StateView> {
    Json(state.view())
}

pub async fn get_latest_answers(
    State(state): State<Arc<AggregationState>>,
) -> Json<LatestAnswers> {
    Json((*state.latest_answers()).clone())
}

/// `null` until the symbol's first cycle completes; 404 if it is not configured.
pub async fn get_latest_answer(
    State(state): State<Arc<AggregationState>>,
    Path(symbol): Path<String>,
) -> Result<Json<Option<LatestAnswer>>, StatusCode> {
    state
        .latest_answer(&symbol)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}
