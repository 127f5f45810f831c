//! Health check endpoints

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub profiles: usize,
    pub default_profile: Option<String>,
}

/// Health check - always returns OK if the server is running
async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check - ready once at least one quality profile is loaded
async fn readyz(State(state): State<AppState>) -> Json<ReadyResponse> {
    let snapshot = state.store.snapshot();
    let profiles = snapshot.profile_count();

    Json(ReadyResponse {
        ready: profiles > 0,
        profiles,
        default_profile: snapshot.default_profile().map(str::to_string),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
