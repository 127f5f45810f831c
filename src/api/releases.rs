//! Release parsing API

use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::services::quality_evaluator::{PriorityResult, QualityEvaluator};
use crate::services::release_parser::{
    MediaKind, ParsedRelease, parse_release, parse_release_with_profile,
};

#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    /// Raw release name
    pub name: String,
    #[serde(default)]
    pub kind: MediaKind,
    /// Quality profile to score against; the configured default when absent
    #[serde(default)]
    pub profile: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ParseResponse {
    pub parsed: ParsedRelease,
    /// Absent when no profile is configured
    pub priority: Option<PriorityResult>,
}

/// Parse a release name and score it when a profile is available
async fn parse_name(
    State(state): State<AppState>,
    Json(request): Json<ParseRequest>,
) -> Result<Json<ParseResponse>, (StatusCode, String)> {
    let snapshot = state.store.snapshot();

    let profile = match request.profile.as_deref() {
        Some(name) => Some(snapshot.profile(name).ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("quality profile '{}' is not configured", name),
            )
        })?),
        None => snapshot.profile_or_default(None),
    };

    let (parsed, priority) = match profile {
        Some(profile) => {
            let parsed = parse_release_with_profile(&request.name, request.kind, profile);
            let priority = QualityEvaluator::match_release(&parsed, parsed.release_name(), profile);
            (parsed, Some(priority))
        }
        None => (parse_release(&request.name, request.kind), None),
    };

    Ok(Json(ParseResponse { parsed, priority }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/parse", post(parse_name))
}
