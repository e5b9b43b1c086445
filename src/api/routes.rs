use axum::{http::Method, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::service::ReadingService;

use super::handlers::{export_sensor_data, health_check, read_sensor_data, AppState};

pub fn create_api_router(service: ReadingService, cors_allow_any: bool) -> Router {
    let state = Arc::new(AppState { service });

    let router = Router::new()
        .route("/health", get(health_check))
        .route("/api/sensor-data", get(read_sensor_data))
        .route("/api/export", get(export_sensor_data))
        .with_state(state);

    let router = if cors_allow_any {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::OPTIONS])
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.layer(TraceLayer::new_for_http())
}
