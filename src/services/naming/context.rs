//! Render contexts for naming and notification templates
//!
//! Field names serialize in the PascalCase form templates reference
//! (`.Dbmovie.Title`, `.Source.Identifier`, ...). Every path listed in the
//! schema catalog exists in these structs; optional values serialize as null
//! and render as empty text.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::services::naming::schema::SchemaType;
use crate::services::quality_evaluator::PriorityResult;
use crate::services::release_parser::ParsedRelease;

/// Movie metadata from the library database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MovieMetadata {
    pub title: String,
    pub year: Option<u16>,
    #[serde(rename = "ImdbID")]
    pub imdb_id: Option<String>,
    pub original_title: Option<String>,
    pub runtime: Option<u32>,
    pub slug: Option<String>,
}

/// Series metadata from the library database
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SeriesMetadata {
    pub seriename: String,
    pub year: Option<u16>,
    pub firstaired: Option<String>,
    #[serde(rename = "ThetvdbID")]
    pub thetvdb_id: Option<u32>,
    #[serde(rename = "ImdbID")]
    pub imdb_id: Option<String>,
    pub network: Option<String>,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EpisodeMetadata {
    pub title: String,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub identifier: Option<String>,
    pub first_aired: Option<String>,
    pub runtime: Option<u32>,
}

/// Library item a file is being organized into
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LibraryMetadata {
    /// Nothing known beyond the release name
    #[default]
    None,
    Movie(MovieMetadata),
    Episode {
        serie: SeriesMetadata,
        episode: EpisodeMetadata,
    },
}

impl LibraryMetadata {
    fn movie(&self) -> Option<&MovieMetadata> {
        match self {
            LibraryMetadata::Movie(movie) => Some(movie),
            _ => None,
        }
    }

    fn serie(&self) -> Option<&SeriesMetadata> {
        match self {
            LibraryMetadata::Episode { serie, .. } => Some(serie),
            _ => None,
        }
    }

    fn episode(&self) -> Option<&EpisodeMetadata> {
        match self {
            LibraryMetadata::Episode { episode, .. } => Some(episode),
            _ => None,
        }
    }

    /// Movie title or series name, when known and non-empty
    fn display_title(&self) -> Option<&str> {
        let title = match self {
            LibraryMetadata::None => return None,
            LibraryMetadata::Movie(movie) => movie.title.as_str(),
            LibraryMetadata::Episode { serie, .. } => serie.seriename.as_str(),
        };
        (!title.is_empty()).then_some(title)
    }

    fn year(&self) -> Option<u16> {
        match self {
            LibraryMetadata::None => None,
            LibraryMetadata::Movie(movie) => movie.year,
            LibraryMetadata::Episode { serie, .. } => serie.year,
        }
    }
}

/// What the release name itself says, exposed as `.Source`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SourceContext {
    pub title: String,
    pub year: Option<u16>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub episodes: Vec<i32>,
    pub identifier: String,
    pub date: Option<String>,
    pub resolution: Option<String>,
    pub quality: Option<String>,
    pub codec: Option<String>,
    pub audio: Option<String>,
    pub languages: Vec<String>,
    pub proper: bool,
    pub extended: bool,
    pub repack: bool,
    pub imdb: Option<String>,
    pub tvdb: Option<String>,
    pub runtime: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size: Option<u64>,
}

impl From<&ParsedRelease> for SourceContext {
    fn from(parsed: &ParsedRelease) -> Self {
        let flags = parsed.flags();
        let file = parsed.file();
        Self {
            title: parsed.title().to_string(),
            year: parsed.year(),
            season: parsed.season(),
            episode: parsed.episode(),
            episodes: parsed.episodes().to_vec(),
            identifier: parsed.identifier().to_string(),
            date: parsed.date().map(|d| d.format("%Y-%m-%d").to_string()),
            resolution: parsed.resolution().map(str::to_string),
            quality: parsed.quality().map(str::to_string),
            codec: parsed.codec().map(str::to_string),
            audio: parsed.audio().map(str::to_string),
            languages: parsed.languages().to_vec(),
            proper: flags.proper,
            extended: flags.extended,
            repack: flags.repack,
            imdb: parsed.external_ids().imdb.clone(),
            tvdb: parsed.external_ids().tvdb.clone(),
            runtime: file.runtime,
            width: file.width,
            height: file.height,
            size: file.size,
        }
    }
}

/// Context of folder/file naming templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParserContext {
    pub dbmovie: Option<MovieMetadata>,
    pub dbserie: Option<SeriesMetadata>,
    pub dbserie_episode: Option<EpisodeMetadata>,
    pub source: SourceContext,
    pub title_source: String,
    pub episode_title_source: String,
    pub identifier: String,
    pub episodes: Vec<i32>,
    pub priority: i64,
}

impl ParserContext {
    /// Library metadata wins over what the release name says
    pub fn new(
        parsed: &ParsedRelease,
        metadata: &LibraryMetadata,
        priority: Option<&PriorityResult>,
    ) -> Self {
        let episode = metadata.episode();
        let identifier = episode
            .and_then(|e| e.identifier.clone())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| parsed.identifier().to_string());

        Self {
            dbmovie: metadata.movie().cloned(),
            dbserie: metadata.serie().cloned(),
            dbserie_episode: episode.cloned(),
            source: SourceContext::from(parsed),
            title_source: metadata
                .display_title()
                .unwrap_or(parsed.title())
                .to_string(),
            episode_title_source: episode.map(|e| e.title.clone()).unwrap_or_default(),
            identifier,
            episodes: parsed.episodes().to_vec(),
            priority: priority.map(|p| p.score).unwrap_or_default(),
        }
    }
}

/// Context of messages sent after a file was organized
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationContext {
    pub time: String,
    pub title: String,
    pub year: Option<u16>,
    pub season: Option<i32>,
    pub episode: Option<i32>,
    pub identifier: String,
    pub quality: String,
    pub source_path: String,
    pub targetpath: String,
    pub configuration: String,
    pub replaced: Vec<String>,
    pub source: SourceContext,
    pub dbmovie: Option<MovieMetadata>,
    pub dbserie: Option<SeriesMetadata>,
    pub dbserie_episode: Option<EpisodeMetadata>,
}

/// Facts about the organize step a notification reports on
#[derive(Debug, Clone, Default)]
pub struct OrganizedFile {
    pub time: Option<NaiveDateTime>,
    pub quality_profile: String,
    pub configuration: String,
    pub source_path: String,
    pub target_path: String,
    pub replaced: Vec<String>,
}

impl NotificationContext {
    pub fn new(parsed: &ParsedRelease, metadata: &LibraryMetadata, organized: OrganizedFile) -> Self {
        let naming = ParserContext::new(parsed, metadata, None);
        Self {
            time: organized
                .time
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default(),
            title: naming.title_source,
            year: metadata.year().or(parsed.year()),
            season: parsed.season(),
            episode: parsed.episode(),
            identifier: naming.identifier,
            quality: organized.quality_profile,
            source_path: organized.source_path,
            targetpath: organized.target_path,
            configuration: organized.configuration,
            replaced: organized.replaced,
            source: naming.source,
            dbmovie: naming.dbmovie,
            dbserie: naming.dbserie,
            dbserie_episode: naming.dbserie_episode,
        }
    }
}

// =============================================================================
// Preview samples
// =============================================================================

fn sample_movie() -> MovieMetadata {
    MovieMetadata {
        title: "The Matrix".to_string(),
        year: Some(1999),
        imdb_id: Some("tt0133093".to_string()),
        original_title: Some("The Matrix".to_string()),
        runtime: Some(136),
        slug: Some("the-matrix".to_string()),
    }
}

fn sample_serie() -> SeriesMetadata {
    SeriesMetadata {
        seriename: "Breaking Bad".to_string(),
        year: Some(2008),
        firstaired: Some("2008-01-20".to_string()),
        thetvdb_id: Some(81189),
        imdb_id: Some("tt0903747".to_string()),
        network: Some("AMC".to_string()),
        slug: Some("breaking-bad".to_string()),
    }
}

fn sample_episode() -> EpisodeMetadata {
    EpisodeMetadata {
        title: "Pilot".to_string(),
        season: Some(1),
        episode: Some(1),
        identifier: Some("S01E01".to_string()),
        first_aired: Some("2008-01-20".to_string()),
        runtime: Some(58),
    }
}

fn sample_source() -> SourceContext {
    SourceContext {
        title: "Breaking Bad".to_string(),
        year: Some(2008),
        season: Some(1),
        episode: Some(1),
        episodes: vec![1],
        identifier: "S01E01".to_string(),
        date: Some("2008-01-20".to_string()),
        resolution: Some("1080p".to_string()),
        quality: Some("BluRay".to_string()),
        codec: Some("x264".to_string()),
        audio: Some("DTS-HD.MA".to_string()),
        languages: vec!["english".to_string()],
        proper: false,
        extended: false,
        repack: false,
        imdb: Some("tt0903747".to_string()),
        tvdb: Some("81189".to_string()),
        runtime: Some(58),
        width: Some(1920),
        height: Some(1080),
        size: Some(1_073_741_824),
    }
}

/// A fully populated context used to preview templates
pub fn sample_context(schema_type: SchemaType) -> serde_json::Value {
    let value = match schema_type {
        SchemaType::Parser => serde_json::to_value(ParserContext {
            dbmovie: Some(sample_movie()),
            dbserie: Some(sample_serie()),
            dbserie_episode: Some(sample_episode()),
            source: sample_source(),
            title_source: "Breaking Bad".to_string(),
            episode_title_source: "Pilot".to_string(),
            identifier: "S01E01".to_string(),
            episodes: vec![1],
            priority: 9,
        }),
        SchemaType::Notification => serde_json::to_value(NotificationContext {
            time: "2026-01-07 20:15:00".to_string(),
            title: "Breaking Bad".to_string(),
            year: Some(2008),
            season: Some(1),
            episode: Some(1),
            identifier: "S01E01".to_string(),
            quality: "HD".to_string(),
            source_path: "/downloads/Breaking.Bad.S01E01.1080p.BluRay.x264-GROUP.mkv".to_string(),
            targetpath: "/tv/Breaking Bad/Season 1".to_string(),
            configuration: "series-en".to_string(),
            replaced: vec!["/tv/Breaking Bad/Season 1/Breaking Bad - S01E01 - Pilot.avi".to_string()],
            source: sample_source(),
            dbmovie: Some(sample_movie()),
            dbserie: Some(sample_serie()),
            dbserie_episode: Some(sample_episode()),
        }),
    };
    // Plain structs with string keys always serialize
    value.unwrap_or_default()
}
