//! Router tests for the HTTP API
//!
//! Requests go through the full router (including CORS and trace layers)
//! with `tower::ServiceExt::oneshot`.

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use curator::AppState;
use curator::api;
use curator::config::{Config, ConfigDocument, ConfigSnapshot, ConfigStore};

const DOCUMENT: &str = r#"
default_profile: HD
entries:
  - type: regex
    name: no-cam
    rejected: ["\\bcam\\b"]
  - type: quality
    name: HD
    regex_config: no-cam
    resolution:
      - { name: 720p, priority: 2 }
      - { name: 1080p, priority: 3 }
    quality:
      - { name: BluRay, priority: 5 }
    codec:
      - { name: x264, priority: 1 }
  - type: naming
    name: movies
    kind: movie
    template: "{{.TitleSource}} ({{.Source.Year}})/{{.TitleSource}} ({{.Source.Year}})"
"#;

fn config() -> Config {
    Config::from_lookup(|_| None).unwrap()
}

fn app() -> Router {
    let document = ConfigDocument::from_yaml(DOCUMENT).unwrap();
    let store = ConfigStore::new(ConfigSnapshot::validated(&document).unwrap());
    api::app(AppState::new(config(), store))
}

/// Send one request; plain-text bodies come back as a JSON string
async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).to_string()));
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_healthz() {
    let (status, body) = send(app(), get("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_readyz_reports_profiles() {
    let (status, body) = send(app(), get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"ready": true, "profiles": 1, "default_profile": "HD"}));
}

#[tokio::test]
async fn test_readyz_without_profiles() {
    let app = api::app(AppState::new(config(), ConfigStore::new(ConfigSnapshot::default())));
    let (_, body) = send(app, get("/readyz")).await;
    assert_eq!(body["ready"], false);
}

// ============================================================================
// Naming templates
// ============================================================================

#[tokio::test]
async fn test_verify_valid_template() {
    let (status, body) = send(
        app(),
        post(
            "/api/naming/verify",
            json!({"template": "{{.Dbmovie.Title}} ({{.Dbmovie.Year}})", "data_type": "parser"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["message"], "Template syntax is valid");
    assert!(body.get("errors").is_none());
}

#[tokio::test]
async fn test_verify_suggests_close_field() {
    let (_, body) = send(
        app(),
        post("/api/naming/verify", json!({"template": "{{.Dbmovie.Titl}}"})),
    )
    .await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["message"], "Template validation failed");
    let suggestions = body["suggestions"].as_array().unwrap();
    assert!(suggestions.contains(&json!("Did you mean 'Dbmovie.Title'?")));
}

#[tokio::test]
async fn test_verify_unmatched_braces() {
    let (_, body) = send(
        app(),
        post("/api/naming/verify", json!({"template": "{{.Dbmovie.Title}"})),
    )
    .await;
    assert_eq!(body["valid"], false);
    assert_eq!(body["errors"], json!(["Unmatched template braces"]));
}

#[tokio::test]
async fn test_unknown_data_type_is_bad_request() {
    let (status, body) = send(
        app(),
        post("/api/naming/verify", json!({"template": "{{.X}}", "data_type": "xml"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.as_str().unwrap().contains("xml"));

    let (status, _) = send(app(), get("/api/naming/schema/xml")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_preview_renders_sample() {
    let (status, body) = send(
        app(),
        post(
            "/api/naming/preview",
            json!({"template": "{{.Dbmovie.Title}} ({{.Dbmovie.Year}})"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "The Matrix (1999)");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_preview_reports_render_error() {
    let (status, body) = send(
        app(),
        post(
            "/api/naming/preview",
            json!({"template": "{{if .Title}}open", "data_type": "notification"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_preview_oversized_printf_width_is_an_error() {
    let (status, body) = send(
        app(),
        post(
            "/api/naming/preview",
            json!({"template": "{{printf \"%18446744073709551615d\" 1}}"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], "");
    assert!(body["error"].as_str().unwrap().contains("width"));
}

#[tokio::test]
async fn test_schema_lists_fields_and_snippets() {
    let (status, body) = send(app(), get("/api/naming/schema/notification")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_type"], "notification");
    let paths: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["path"].as_str())
        .collect();
    assert!(paths.contains(&"Replaced"));
    assert!(paths.contains(&"Dbserie.Seriename"));
    assert_eq!(body["snippets"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_process_names_movie() {
    let (status, body) = send(
        app(),
        post(
            "/api/naming/process",
            json!({"file": {"path": "/downloads/Heat.1995.1080p.BluRay.x264.mkv"}, "kind": "movie"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!({"folder": "Heat (1995)", "file": "Heat (1995)"}));
    assert_eq!(body["priority"]["score"], 9);
}

#[tokio::test]
async fn test_process_rejection_and_missing_naming() {
    let (status, _) = send(
        app(),
        post(
            "/api/naming/process",
            json!({"raw": "Heat.1995.CAM.x264", "kind": "movie"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        app(),
        post(
            "/api/naming/process",
            json!({"raw": "Show.S01E01.720p", "kind": "series"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Parsing and regex self-test
// ============================================================================

#[tokio::test]
async fn test_parse_scores_with_default_profile() {
    let (status, body) = send(
        app(),
        post(
            "/api/parse",
            json!({"name": "Breaking.Bad.S01E01.1080p.BluRay.x264-GROUP", "kind": "series"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["parsed"]["title"], "Breaking Bad");
    assert_eq!(body["parsed"]["identifier"], "S01E01");
    assert_eq!(body["priority"]["profile"], "HD");
    assert_eq!(body["priority"]["score"], 9);
    assert_eq!(body["priority"]["rejected"], false);
}

#[tokio::test]
async fn test_parse_unknown_profile() {
    let (status, _) = send(
        app(),
        post("/api/parse", json!({"name": "Heat.1995", "profile": "UHD"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_regex_self_test() {
    let (status, body) = send(
        app(),
        post(
            "/api/regex/test",
            json!({
                "test_string": "Movie.2020.CAM",
                "test_global": false,
                "test_regex_config": true,
                "selected_regex_config": "no-cam"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"type": "rejected", "name": "no-cam", "pattern": "\\bcam\\b", "match": true, "match_string": "CAM"}])
    );
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn test_config_summary() {
    let (status, body) = send(app(), get("/api/config")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profiles"], json!(["HD"]));
    assert_eq!(body["namings"], json!(["movies"]));
    assert_eq!(body["issues"], json!([]));
}

#[tokio::test]
async fn test_reload_without_source_conflicts() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/config/reload")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app(), request).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_reload_keeps_snapshot_on_invalid_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("profiles.yaml");
    std::fs::write(&path, DOCUMENT).unwrap();

    let store = ConfigStore::open(&path, None).unwrap();
    let app = api::app(AppState::new(config(), store));
    let reload = || {
        Request::builder()
            .method("POST")
            .uri("/api/config/reload")
            .body(Body::empty())
            .unwrap()
    };

    std::fs::write(
        &path,
        "entries:\n  - type: quality\n    name: Broken\n    rejected_patterns: [\"(cam\"]\n",
    )
    .unwrap();
    let (status, _) = send(app.clone(), reload()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (_, body) = send(app.clone(), get("/api/config")).await;
    assert_eq!(body["profiles"], json!(["HD"]));

    std::fs::write(
        &path,
        "entries:\n  - type: quality\n    name: SD\n    resolution: [{ name: 480p, priority: 1 }]\n",
    )
    .unwrap();
    let (status, body) = send(app.clone(), reload()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profiles"], json!(["SD"]));
}
