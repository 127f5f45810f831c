//! Naming pipeline
//!
//! Takes one downloaded file from name to target path:
//! 1. parse the release name (with the profile's vocabularies)
//! 2. score it against the quality profile; a rejection stops here
//! 3. build the parser context from the parse result and library metadata
//! 4. render the naming configuration into a sanitized relative path
//!
//! Pure: nothing touches the filesystem. Moving the file is the caller's job.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ConfigSnapshot;
use crate::error::CoreError;
use crate::services::naming::context::{LibraryMetadata, ParserContext};
use crate::services::naming::{RenderedName, render_name};
use crate::services::quality_evaluator::{PriorityResult, QualityEvaluator};
use crate::services::release_parser::{
    FileInfo, MediaKind, ParsedRelease, parse_file, parse_named_file,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("quality profile '{0}' is not configured")]
    UnknownProfile(String),

    #[error("no quality profile given and no default configured")]
    NoProfile,

    #[error("naming '{0}' is not configured")]
    UnknownNaming(String),

    #[error("no naming configured for {0}")]
    NoNaming(MediaKind),

    #[error("'{raw}' rejected by profile '{profile}': {reason}")]
    Rejected {
        raw: String,
        profile: String,
        reason: CoreError,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PipelineError {
    /// Retrying the same file with the same configuration will fail again
    pub fn is_terminal(&self) -> bool {
        match self {
            PipelineError::Rejected { .. } => true,
            PipelineError::Core(e) => e.is_terminal(),
            _ => false,
        }
    }
}

/// One file to name
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamingRequest {
    #[serde(default)]
    pub file: FileInfo,
    /// Release name; the file name stem is used when empty
    #[serde(default)]
    pub raw: String,
    #[serde(default)]
    pub kind: MediaKind,
    /// Quality profile; the configured default when `None`
    #[serde(default)]
    pub profile: Option<String>,
    /// Naming configuration; the first one for `kind` when `None`
    #[serde(default)]
    pub naming: Option<String>,
    #[serde(default)]
    pub metadata: LibraryMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub parsed: ParsedRelease,
    pub priority: PriorityResult,
    pub name: RenderedName,
}

/// Runs [NamingRequest]s against one configuration snapshot
pub struct NamingPipeline {
    config: Arc<ConfigSnapshot>,
}

impl NamingPipeline {
    pub fn new(config: Arc<ConfigSnapshot>) -> Self {
        Self { config }
    }

    pub fn process(&self, request: &NamingRequest) -> Result<PipelineOutcome, PipelineError> {
        let profile = match request.profile.as_deref() {
            Some(name) => self
                .config
                .profile(name)
                .ok_or_else(|| PipelineError::UnknownProfile(name.to_string()))?,
            None => self
                .config
                .profile_or_default(None)
                .ok_or(PipelineError::NoProfile)?,
        };
        let naming = match request.naming.as_deref() {
            Some(name) => self
                .config
                .naming(name)
                .ok_or_else(|| PipelineError::UnknownNaming(name.to_string()))?,
            None => self
                .config
                .naming_for_kind(request.kind)
                .ok_or(PipelineError::NoNaming(request.kind))?,
        };

        // An explicit release name wins over whatever the path says
        let parsed = if request.raw.is_empty() {
            parse_file(request.file.clone(), request.kind, Some(profile))
        } else {
            parse_named_file(&request.raw, request.file.clone(), request.kind, Some(profile))
        };
        if parsed.is_unresolved() {
            return Err(CoreError::UnresolvedIdentifier(parsed.raw().to_string()).into());
        }

        let priority = QualityEvaluator::match_release(&parsed, parsed.release_name(), profile);
        if let Some(reason) = priority.rejection() {
            debug!(raw = parsed.raw(), profile = %profile.name, "Pipeline stopped by rejection");
            return Err(PipelineError::Rejected {
                raw: parsed.raw().to_string(),
                profile: profile.name.clone(),
                reason: reason.clone(),
            });
        }

        let context = ParserContext::new(&parsed, &request.metadata, Some(&priority));
        let name = render_name(&naming.template, &context).map_err(CoreError::from)?;

        info!(
            raw = parsed.raw(),
            naming = %naming.name,
            folder = %name.folder,
            file = %name.file,
            score = priority.score,
            "Named release"
        );

        Ok(PipelineOutcome {
            parsed,
            priority,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigDocument;
    use crate::services::naming::context::{EpisodeMetadata, SeriesMetadata};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    const DOCUMENT: &str = r#"
default_profile: HD
entries:
  - type: quality
    name: HD
    resolution:
      - { name: 720p, priority: 2 }
      - { name: 1080p, priority: 3 }
    quality:
      - { name: BluRay, priority: 5 }
      - { name: HDTV, priority: 1 }
    codec:
      - { name: x264, priority: 1 }
    rejected_patterns: ["\\bcam\\b"]
  - type: naming
    name: tv
    kind: series
    folder: "{{.TitleSource}}/Season {{printf \"%02d\" .Source.Season}}"
    file: "{{.TitleSource}} - {{.Identifier}}{{if .EpisodeTitleSource}} - {{.EpisodeTitleSource}}{{end}} [{{.Source.Resolution}}]"
  - type: naming
    name: movies
    kind: movie
    template: "{{.TitleSource}} ({{.Source.Year}})/{{.TitleSource}} ({{.Source.Year}})"
"#;

    fn pipeline() -> NamingPipeline {
        let document = ConfigDocument::from_yaml(DOCUMENT).unwrap();
        let snapshot = ConfigSnapshot::validated(&document).unwrap();
        NamingPipeline::new(Arc::new(snapshot))
    }

    fn request(path: &str, kind: MediaKind) -> NamingRequest {
        NamingRequest {
            file: FileInfo::from_path(path),
            kind,
            ..Default::default()
        }
    }

    #[test]
    fn test_episode_is_named_from_metadata() {
        let mut req = request(
            "/downloads/Breaking.Bad.S01E01.1080p.BluRay.x264-GROUP.mkv",
            MediaKind::Series,
        );
        req.metadata = LibraryMetadata::Episode {
            serie: SeriesMetadata {
                seriename: "Breaking Bad".to_string(),
                ..Default::default()
            },
            episode: EpisodeMetadata {
                title: "Pilot".to_string(),
                ..Default::default()
            },
        };
        let outcome = pipeline().process(&req).unwrap();
        assert_eq!(outcome.priority.score, 3 + 5 + 1);
        assert_eq!(outcome.name.folder, "Breaking Bad/Season 01");
        assert_eq!(outcome.name.file, "Breaking Bad - S01E01 - Pilot [1080p]");
    }

    #[test]
    fn test_movie_without_metadata_uses_release_title() {
        let outcome = pipeline()
            .process(&request("/downloads/Heat.1995.720p.HDTV.x264.mkv", MediaKind::Movie))
            .unwrap();
        assert_eq!(outcome.name.folder, "Heat (1995)");
        assert_eq!(outcome.name.file, "Heat (1995)");
    }

    #[test]
    fn test_unresolved_series_is_terminal() {
        let err = pipeline()
            .process(&request("Some.Show.1080p.mkv", MediaKind::Series))
            .unwrap_err();
        assert_matches!(err, PipelineError::Core(CoreError::UnresolvedIdentifier(_)));
        assert!(err.is_terminal());
    }

    #[test]
    fn test_rejected_release_stops_pipeline() {
        let err = pipeline()
            .process(&request("New.Movie.2024.CAM.x264.mkv", MediaKind::Movie))
            .unwrap_err();
        assert_matches!(
            err,
            PipelineError::Rejected { ref reason, .. } if *reason == CoreError::RejectedPatternMatched("\\bcam\\b".to_string())
        );
        assert!(err.is_terminal());
    }

    #[test]
    fn test_file_extension_is_not_matched_as_a_token() {
        let document = ConfigDocument::from_yaml(&DOCUMENT.replace(r"\\bcam\\b", r"\\bts\\b")).unwrap();
        let pipeline = NamingPipeline::new(Arc::new(ConfigSnapshot::validated(&document).unwrap()));

        let outcome = pipeline
            .process(&request("/downloads/Heat.1995.720p.HDTV.x264.ts", MediaKind::Movie))
            .unwrap();
        assert!(!outcome.priority.rejected);
        assert_eq!(outcome.name.file, "Heat (1995)");

        let err = pipeline
            .process(&request("/downloads/Heat.1995.TS.x264.mkv", MediaKind::Movie))
            .unwrap_err();
        assert_matches!(err, PipelineError::Rejected { .. });
    }

    #[test]
    fn test_unknown_configuration() {
        let mut req = request("Heat.1995.mkv", MediaKind::Movie);
        req.profile = Some("UHD".to_string());
        assert_matches!(pipeline().process(&req), Err(PipelineError::UnknownProfile(p)) if p == "UHD");

        let mut req = request("Heat.1995.mkv", MediaKind::Movie);
        req.naming = Some("anime".to_string());
        let err = pipeline().process(&req).unwrap_err();
        assert_matches!(err, PipelineError::UnknownNaming(_));
        assert!(!err.is_terminal());
    }

    #[test]
    fn test_explicit_raw_name_wins() {
        let mut req = request("/downloads/abc123.mkv", MediaKind::Series);
        req.raw = "Show.Name.S02E03.720p.HDTV".to_string();
        let outcome = pipeline().process(&req).unwrap();
        assert_eq!(outcome.parsed.identifier(), "S02E03");
        assert_eq!(outcome.name.file, "Show Name - S02E03 [720p]");
    }
}
