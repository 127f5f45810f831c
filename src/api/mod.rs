//! API route definitions
//!
//! REST endpoints for configuration tooling: template authoring, regex
//! self-tests, release parsing and profile document reloads.

pub mod config;
pub mod health;
pub mod naming;
pub mod regex;
pub mod releases;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Full application router with CORS and request tracing
pub fn app(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .merge(health::router())
        // REST API endpoints
        .nest("/api/naming", naming::router())
        .nest("/api/regex", regex::router())
        .nest("/api/config", config::router())
        .nest("/api", releases::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
