//! Profile document API

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;

use crate::AppState;
use crate::config::{ConfigError, ConfigIssue, ConfigSnapshot};

#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub profiles: Vec<String>,
    pub namings: Vec<String>,
    pub default_profile: Option<String>,
    /// Problems tolerated when the snapshot was built
    pub issues: Vec<ConfigIssue>,
}

impl From<&ConfigSnapshot> for ConfigSummary {
    fn from(snapshot: &ConfigSnapshot) -> Self {
        Self {
            profiles: snapshot.profile_names().map(str::to_string).collect(),
            namings: snapshot.naming_names().map(str::to_string).collect(),
            default_profile: snapshot.default_profile().map(str::to_string),
            issues: snapshot.issues().to_vec(),
        }
    }
}

/// What is loaded right now
async fn get_config(State(state): State<AppState>) -> Json<ConfigSummary> {
    Json(ConfigSummary::from(state.store.snapshot().as_ref()))
}

/// Re-read the profile document; the loaded snapshot stays on failure
async fn reload_config(
    State(state): State<AppState>,
) -> Result<Json<ConfigSummary>, (StatusCode, String)> {
    match state.store.reload() {
        Ok(snapshot) => Ok(Json(ConfigSummary::from(snapshot.as_ref()))),
        Err(ConfigError::NoSource) => Err((
            StatusCode::CONFLICT,
            ConfigError::NoSource.to_string(),
        )),
        Err(e) => Err((StatusCode::UNPROCESSABLE_ENTITY, e.to_string())),
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_config))
        .route("/reload", post(reload_config))
}
