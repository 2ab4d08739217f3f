//! Route table for the planning API.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/clusters/{cluster_id}/compose", post(handlers::compose_cluster))
        .route("/planning/season/run", post(handlers::run_season))
        .route("/planning/week/run", post(handlers::run_week))
        .route("/planning/capacity-grid", get(handlers::capacity_grid))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
