pub mod args;
pub mod error;
pub mod routes;
pub mod types;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// How long browsers may cache a CORS preflight answer
const CORS_MAX_AGE: Duration = Duration::from_secs(6 * 60 * 60);

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(routes::health_check))
        // Index page
        .route("/", get(routes::index))
        // Checkpoint catalog endpoints
        .route("/_get_dates", get(routes::get_dates).post(routes::get_dates))
        .route("/_get_epochs", get(routes::get_epochs).post(routes::get_epochs))
        .route("/_get_steps", get(routes::get_steps).post(routes::get_steps))
        // Prediction endpoint
        .route("/_predict", get(routes::predict).post(routes::predict))
        // Attach application state
        .with_state(state)
        // Middleware
        .layer(cors_layer())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::HeaderName::from_static("x-ua-compatible"),
            HeaderValue::from_static("IE=Edge,chrome=1"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Any origin may call the API with a `Content-Type` header
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(CORS_MAX_AGE)
}
