pub mod analyze;
pub mod health;

pub use analyze::*;
pub use health::*;

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, services::ServeFile, trace::TraceLayer};

use crate::middleware::{api_key_middleware, logging_middleware, rate_limit_middleware};
use crate::state::AppState;

/// Builds the full application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.max_body_bytes();
    let index = ServeFile::new(&state.config.static_index_path);

    // Key check wraps the limiter so a keyless request never takes a permit.
    let analyze = post(analyze_handler)
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(from_fn(api_key_middleware));

    Router::new()
        .route_service("/", index)
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/analyze", analyze)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(body_limit))
                .layer(from_fn(logging_middleware)),
        )
        .with_state(state)
}
