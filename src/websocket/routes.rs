use crate::room::RoomEngine;
use axum::extract::State;
use axum::routing::get;
use std::sync::Arc;

use super::handler::websocket_handler;

/// Create the Axum router with WebSocket support.
pub fn create_router(cors_origins: &str) -> axum::Router<Arc<RoomEngine>> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let cors = if cors_origins == "*" {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = cors_origins
            .split(',')
            .filter_map(|s| s.trim().parse::<axum::http::HeaderValue>().ok())
            .collect();

        if origins.is_empty() {
            tracing::warn!("No valid CORS origins configured, using permissive CORS");
            CorsLayer::permissive()
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    axum::Router::new()
        .route("/ws", get(websocket_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe. Always healthy once the process is serving requests; the
/// room count is logged for operational visibility rather than gating the
/// response.
async fn health_check(State(engine): State<Arc<RoomEngine>>) -> &'static str {
    tracing::trace!(rooms = engine.room_count(), "health check");
    "OK"
}
