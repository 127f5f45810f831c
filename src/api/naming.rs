//! Naming template authoring API
//!
//! Verify and preview are side-effect free; template problems come back as
//! fields of a 200 response, only malformed requests are HTTP errors.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::AppState;
use crate::services::naming::context::sample_context;
use crate::services::naming::schema::{FieldDescriptor, TemplateSnippet, schema, structure_catalog};
use crate::services::naming::{SchemaType, render, verify};
use crate::services::pipeline::{NamingPipeline, NamingRequest, PipelineError, PipelineOutcome};

fn default_data_type() -> String {
    SchemaType::Parser.as_str().to_string()
}

#[derive(Debug, Deserialize)]
pub struct TemplateRequest {
    pub template: String,
    /// `parser` or `notification`
    #[serde(default = "default_data_type")]
    pub data_type: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub template: String,
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub template: String,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub data_type: SchemaType,
    pub fields: &'static [FieldDescriptor],
    pub snippets: &'static [TemplateSnippet],
}

fn parse_data_type(value: &str) -> Result<SchemaType, (StatusCode, String)> {
    value
        .parse()
        .map_err(|e: anyhow::Error| (StatusCode::BAD_REQUEST, e.to_string()))
}

fn non_empty(items: Vec<String>) -> Option<Vec<String>> {
    (!items.is_empty()).then_some(items)
}

/// Static check of a template against the field catalog
async fn verify_template(
    Json(request): Json<TemplateRequest>,
) -> Result<Json<VerifyResponse>, (StatusCode, String)> {
    let schema_type = parse_data_type(&request.data_type)?;
    let result = verify(&request.template, schema_type);

    Ok(Json(VerifyResponse {
        valid: result.valid,
        message: result.message,
        errors: non_empty(result.errors),
        suggestions: non_empty(result.suggestions),
        template: request.template,
    }))
}

/// Render a template against the built-in sample context
async fn preview_template(
    Json(request): Json<TemplateRequest>,
) -> Result<Json<PreviewResponse>, (StatusCode, String)> {
    let schema_type = parse_data_type(&request.data_type)?;
    let sample = sample_context(schema_type);

    let (output, error) = match render(&request.template, &sample) {
        Ok(output) => (output, None),
        Err(e) => {
            debug!(data_type = %schema_type, error = %e, "Template preview failed");
            (String::new(), Some(e.to_string()))
        }
    };

    Ok(Json(PreviewResponse {
        template: request.template,
        output,
        error,
    }))
}

/// Field catalog and control snippets of a context type
async fn get_schema(
    Path(data_type): Path<String>,
) -> Result<Json<SchemaResponse>, (StatusCode, String)> {
    let schema_type = parse_data_type(&data_type)?;

    Ok(Json(SchemaResponse {
        data_type: schema_type,
        fields: schema(schema_type).fields(),
        snippets: structure_catalog(),
    }))
}

/// Parse, score and name one file with the current configuration
async fn name_file(
    State(state): State<AppState>,
    Json(request): Json<NamingRequest>,
) -> Result<Json<PipelineOutcome>, (StatusCode, String)> {
    let pipeline = NamingPipeline::new(state.store.snapshot());

    pipeline.process(&request).map(Json).map_err(|e| {
        let status = match e {
            PipelineError::UnknownProfile(_)
            | PipelineError::UnknownNaming(_)
            | PipelineError::NoProfile
            | PipelineError::NoNaming(_) => StatusCode::NOT_FOUND,
            PipelineError::Rejected { .. } | PipelineError::Core(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
        };
        (status, e.to_string())
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/verify", post(verify_template))
        .route("/preview", post(preview_template))
        .route("/schema/{data_type}", get(get_schema))
        .route("/process", post(name_file))
}
