//! Integration tests for the naming pipeline
//!
//! These tests run the sample profile document through the whole flow:
//! - Loading and validating the document
//! - Parsing and scoring release names
//! - Rendering folder/file names

use std::path::Path;
use std::sync::Arc;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use curator::config::{ConfigDocument, ConfigSnapshot};
use curator::error::CoreError;
use curator::services::naming::context::{EpisodeMetadata, LibraryMetadata, SeriesMetadata};
use curator::services::{FileInfo, MediaKind, NamingPipeline, NamingRequest, PipelineError};

fn sample_snapshot() -> Arc<ConfigSnapshot> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/profiles.yaml");
    let document = ConfigDocument::load(&path).unwrap();
    Arc::new(ConfigSnapshot::validated(&document).unwrap())
}

fn request(path: &str, kind: MediaKind) -> NamingRequest {
    NamingRequest {
        file: FileInfo::from_path(path),
        kind,
        ..Default::default()
    }
}

// ============================================================================
// Sample Document Tests
// ============================================================================

mod sample_document {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sample_document_is_valid() {
        let snapshot = sample_snapshot();
        assert!(snapshot.issues().is_empty());
        assert_eq!(snapshot.profile_names().collect::<Vec<_>>(), vec!["HD", "UHD"]);
        assert_eq!(snapshot.default_profile(), Some("HD"));
        assert!(snapshot.naming_for_kind(MediaKind::Series).is_some());
        assert!(snapshot.naming_for_kind(MediaKind::Movie).is_some());
    }
}

// ============================================================================
// Pipeline Tests
// ============================================================================

mod pipeline {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_series_without_metadata_uses_release_title() {
        let pipeline = NamingPipeline::new(sample_snapshot());
        let outcome = pipeline
            .process(&request(
                "/downloads/Breaking.Bad.S01E01.1080p.BluRay.x264-GROUP.mkv",
                MediaKind::Series,
            ))
            .unwrap();

        // 1080p (3) + BluRay (5) + x264 (1)
        assert_eq!(outcome.priority.score, 9);
        assert_eq!(outcome.name.folder, "Breaking Bad/Season 01");
        assert_eq!(outcome.name.file, "Breaking Bad - S01E01 [1080p]");
    }

    #[test]
    fn test_series_with_metadata_uses_library_names() {
        let pipeline = NamingPipeline::new(sample_snapshot());
        let mut req = request(
            "/downloads/breaking.bad.s01e01.720p.hdtv.x264.mkv",
            MediaKind::Series,
        );
        req.metadata = LibraryMetadata::Episode {
            serie: SeriesMetadata {
                seriename: "Breaking Bad (2008)".to_string(),
                ..Default::default()
            },
            episode: EpisodeMetadata {
                title: "Pilot".to_string(),
                ..Default::default()
            },
        };

        let outcome = pipeline.process(&req).unwrap();
        assert_eq!(outcome.name.folder, "Breaking Bad (2008)/Season 01");
        assert!(outcome.name.file.ends_with("S01E01 - Pilot [720p]"));
        assert_eq!(
            outcome.name.relative_path("mkv").extension().and_then(|e| e.to_str()),
            Some("mkv")
        );
    }

    #[test]
    fn test_movie_is_named() {
        let pipeline = NamingPipeline::new(sample_snapshot());
        let outcome = pipeline
            .process(&request("/downloads/Heat.1995.720p.HDTV.x264.mkv", MediaKind::Movie))
            .unwrap();
        assert_eq!(outcome.name.folder, "Heat (1995)");
        assert_eq!(outcome.name.file, "Heat (1995) [720p]");
    }

    #[test]
    fn test_shared_rejection_applies() {
        let pipeline = NamingPipeline::new(sample_snapshot());
        let err = pipeline
            .process(&request("/downloads/New.Movie.2024.CAM.x264.mkv", MediaKind::Movie))
            .unwrap_err();
        assert_matches!(
            err,
            PipelineError::Rejected { reason: CoreError::RejectedPatternMatched(_), .. }
        );
        assert!(err.is_terminal());
    }

    #[test]
    fn test_required_pattern_gates_uhd() {
        let pipeline = NamingPipeline::new(sample_snapshot());
        let mut req = request("/downloads/Dune.2021.1080p.BluRay.x265.mkv", MediaKind::Movie);
        req.profile = Some("UHD".to_string());
        let err = pipeline.process(&req).unwrap_err();
        assert_matches!(
            err,
            PipelineError::Rejected { ref reason, .. } if *reason == CoreError::RequiredPatternMissing("2160p".to_string())
        );
    }

    #[test]
    fn test_weighted_uhd_score() {
        let pipeline = NamingPipeline::new(sample_snapshot());
        let mut req = request("/downloads/Dune.2021.2160p.BluRay.x265.mkv", MediaKind::Movie);
        req.profile = Some("UHD".to_string());
        let outcome = pipeline.process(&req).unwrap();
        // 2 x 2160p (5) + BluRay (5) + x265 (2)
        assert_eq!(outcome.priority.score, 17);
        assert_eq!(outcome.name.file, "Dune (2021) [2160p]");
    }

    #[test]
    fn test_transport_stream_file_is_not_rejected() {
        let pipeline = NamingPipeline::new(sample_snapshot());
        let outcome = pipeline
            .process(&request("/downloads/Show.S01E01.720p.HDTV.ts", MediaKind::Series))
            .unwrap();
        assert!(!outcome.priority.rejected);
        assert_eq!(outcome.name.file, "Show - S01E01 [720p]");
    }

    #[test]
    fn test_processing_is_deterministic() {
        let pipeline = NamingPipeline::new(sample_snapshot());
        let req = request(
            "/downloads/The.Office.US.S02E01.720p.WEB-DL.mkv",
            MediaKind::Series,
        );
        let first = pipeline.process(&req).unwrap();
        let second = pipeline.process(&req).unwrap();
        assert_eq!(first.name, second.name);
        assert_eq!(first.priority, second.priority);
    }
}
