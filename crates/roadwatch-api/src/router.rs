//! Axum router construction.
//!
//! Assembles all routes into a single [`Router`] with CORS and request
//! tracing enabled.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the complete router.
///
/// - `GET /health` -- liveness and index summary
/// - `GET /api/roads`, `GET /api/roads/{id}`
/// - `GET /api/segments`, `GET /api/segments/{id}`
/// - `GET /api/segments/{id}/history` -- durable surface history
/// - `PATCH /api/segments/{id}/surface` -- surface write via the bus
/// - `GET|POST /api/traffic-flows`
/// - `GET|POST /api/road-surfaces`
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/roads", get(handlers::list_roads))
        .route("/api/roads/{id}", get(handlers::get_road))
        .route("/api/segments", get(handlers::list_segments))
        .route("/api/segments/{id}", get(handlers::get_segment))
        .route("/api/segments/{id}/history", get(handlers::segment_history))
        .route("/api/segments/{id}/surface", patch(handlers::update_segment_surface))
        .route(
            "/api/traffic-flows",
            get(handlers::list_traffic_flows).post(handlers::create_traffic_flow),
        )
        .route(
            "/api/road-surfaces",
            get(handlers::list_road_surfaces).post(handlers::create_road_surface),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
