//! Regex self-test API

use axum::{Json, Router, extract::State, routing::post};

use crate::AppState;
use crate::services::regex_tester::{RegexTestRequest, RegexTestRow, run_regex_test};

/// Run a test string through the selected patterns
async fn test_patterns(
    State(state): State<AppState>,
    Json(request): Json<RegexTestRequest>,
) -> Json<Vec<RegexTestRow>> {
    let snapshot = state.store.snapshot();
    Json(run_regex_test(&request, &snapshot))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/test", post(test_patterns))
}
