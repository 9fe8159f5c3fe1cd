use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/health", get(handlers::health_check))
        // Ranking
        .route("/recommendations", post(handlers::recommend))
        .route("/similar", post(handlers::similar_items))
        .layer(middleware)
        .with_state(state)
}
