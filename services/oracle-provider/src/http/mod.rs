pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;

use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let write_routes = Router::new()
        .route("/feed-values", post(handlers::post_feed_values))
        .route("/feed-values/:votingRoundId", post(handlers::post_feed_values_round))
        .route("/volumes", post(handlers::post_volumes))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::rate_limit));

    let read_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/health/readiness", get(handlers::get_readiness))
        .route("/health/liveness", get(handlers::get_liveness))
        .route("/metrics", get(handlers::get_metrics))
        .route("/metrics/api", get(handlers::get_metrics_api))
        .route("/metrics/performance", get(handlers::get_metrics_performance));

    Router::new()
        .merge(write_routes)
        .merge(read_routes)
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .with_state(state)
}
