//! Release parser for scene-style names
//!
//! Parses names like:
//! - "Breaking.Bad.S01E01.1080p.BluRay.x264-GROUP"
//! - "The.Daily.Show.2026.01.07.Stephen.J.Dubner.720p.WEB.h264-EDITH"
//! - "Show.S02E03-E05.German.DL.720p.WEB.h264-GRP"
//!
//! Structure (season, episodes, date, year, ids, audio) comes from the global
//! pattern catalog. Resolution, source quality and codec are only filled when
//! a quality profile is supplied, because those vocabularies are configured
//! per profile.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::services::patterns::{PatternKind, PatternMatch, global_pattern, global_patterns};
use crate::services::quality_profiles::{CompiledProfile, QualityCategory};

/// Sentinel used for series releases whose season/episode/date cannot be resolved
pub const UNRESOLVED: i32 = -1;

/// What kind of library item a release is parsed for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Movie,
    Series,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "series",
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "movie" | "movies" => Ok(MediaKind::Movie),
            "series" | "serie" | "tv" | "show" => Ok(MediaKind::Series),
            _ => Err(anyhow::anyhow!("Unknown media kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFlags {
    pub proper: bool,
    pub extended: bool,
    pub repack: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIds {
    /// IMDb id including the `tt` prefix
    pub imdb: Option<String>,
    /// TheTVDB id, digits only
    pub tvdb: Option<String>,
}

/// File facts supplied by the caller (probing is done elsewhere)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub path: Option<PathBuf>,
    pub size: Option<u64>,
    /// Runtime in minutes
    pub runtime: Option<u32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl FileInfo {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

/// Structured metadata extracted from one release name.
///
/// Built once by the parse functions and read through accessors afterwards.
/// The identifier is always derived from season/episodes or the date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedRelease {
    raw: String,
    kind: MediaKind,
    title: String,
    year: Option<u16>,
    season: Option<i32>,
    episodes: Vec<i32>,
    identifier: String,
    date: Option<NaiveDate>,
    resolution: Option<String>,
    quality: Option<String>,
    codec: Option<String>,
    audio: Option<String>,
    languages: Vec<String>,
    flags: ReleaseFlags,
    external_ids: ExternalIds,
    file: FileInfo,
    unresolved: bool,
}

impl ParsedRelease {
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `raw` without a trailing video extension; what patterns are matched against
    pub fn release_name(&self) -> &str {
        strip_video_extension(self.raw.trim())
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn year(&self) -> Option<u16> {
        self.year
    }

    pub fn season(&self) -> Option<i32> {
        self.season
    }

    /// All episode numbers, in order. `[-1]` when a series release is unresolved.
    pub fn episodes(&self) -> &[i32] {
        &self.episodes
    }

    /// The primary episode used for lookups
    pub fn episode(&self) -> Option<i32> {
        self.episodes.first().copied()
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn resolution(&self) -> Option<&str> {
        self.resolution.as_deref()
    }

    pub fn quality(&self) -> Option<&str> {
        self.quality.as_deref()
    }

    pub fn codec(&self) -> Option<&str> {
        self.codec.as_deref()
    }

    pub fn audio(&self) -> Option<&str> {
        self.audio.as_deref()
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    pub fn flags(&self) -> ReleaseFlags {
        self.flags
    }

    pub fn external_ids(&self) -> &ExternalIds {
        &self.external_ids
    }

    pub fn file(&self) -> &FileInfo {
        &self.file
    }

    /// True when a series release has neither season/episode nor a date
    pub fn is_unresolved(&self) -> bool {
        self.unresolved
    }
}

// =============================================================================
// Secondary vocabularies
// =============================================================================

static EPISODE_SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?: ?(-)? ?)([ex-])(\d{1,3})").expect("episode segment regex must compile")
});

static IDENTIFIER_SEASON_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^s?(\d{1,4})").expect("identifier season regex must compile"));

static FLAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\b|_)(proper|extended|repack)(?:\b|_)").expect("flag regex must compile")
});

static LANGUAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b|_)(english|eng|german|ger|deutsch|french|fre|truefrench|vostfr|spanish|spa|castellano|italian|ita|japanese|jap|jpn|korean|kor|russian|rus|multi|dual)(?:\b|_)",
    )
    .expect("language regex must compile")
});

/// Tokens that end a title when no structural token is present
static TITLE_STOP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b|_)(2160p|1080p|1080i|720p|576p|480p|4k|uhd|bluray|blu-ray|bdrip|brrip|web-?dl|webrip|web|hdtv|dvdrip|dvd|remux|x26[45]|h\.?26[45]|hevc|xvid)(?:\b|_)",
    )
    .expect("title stop regex must compile")
});

const VIDEO_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "m4v", "mov", "wmv", "ts", "m2ts", "mpg", "mpeg", "webm", "iso",
];

fn normalize_language(token: &str) -> &'static str {
    match token.to_lowercase().as_str() {
        "english" | "eng" => "english",
        "german" | "ger" | "deutsch" => "german",
        "french" | "fre" | "truefrench" | "vostfr" => "french",
        "spanish" | "spa" | "castellano" => "spanish",
        "italian" | "ita" => "italian",
        "japanese" | "jap" | "jpn" => "japanese",
        "korean" | "kor" => "korean",
        "russian" | "rus" => "russian",
        "dual" => "dual",
        _ => "multi",
    }
}

/// Remove a trailing video extension ("Movie.1080p.mkv" -> "Movie.1080p")
fn strip_video_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()) => stem,
        _ => name,
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Parse a release name for a movie or series
pub fn parse_release(raw: &str, kind: MediaKind) -> ParsedRelease {
    parse_inner(raw, kind, None, FileInfo::default())
}

/// Parse a release name and fill resolution/quality/codec/audio from the
/// best matching group of each category in `profile`.
pub fn parse_release_with_profile(
    raw: &str,
    kind: MediaKind,
    profile: &CompiledProfile,
) -> ParsedRelease {
    parse_inner(raw, kind, Some(profile), FileInfo::default())
}

/// Parse the stem of a file and attach the caller-supplied file facts
pub fn parse_file(file: FileInfo, kind: MediaKind, profile: Option<&CompiledProfile>) -> ParsedRelease {
    let name = file
        .path
        .as_deref()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    parse_inner(&name, kind, profile, file)
}

/// Parse an explicit release name while keeping the facts of the file it names
pub fn parse_named_file(
    raw: &str,
    file: FileInfo,
    kind: MediaKind,
    profile: Option<&CompiledProfile>,
) -> ParsedRelease {
    parse_inner(raw, kind, profile, file)
}

fn parse_inner(
    raw: &str,
    kind: MediaKind,
    profile: Option<&CompiledProfile>,
    file: FileInfo,
) -> ParsedRelease {
    let name = strip_video_extension(raw.trim());

    // First successful match per pattern name; patterns are independent.
    let mut found: Vec<PatternMatch<'_>> = global_patterns()
        .iter()
        .filter_map(|p| p.find(name))
        .collect();

    // A year at the very start is part of the title when a later year exists ("1917.2019.1080p").
    if let Some(idx) = found.iter().position(|m| m.kind == PatternKind::Year && m.start == 0) {
        if let Some(later) = global_pattern(PatternKind::Year).find_iter(name).nth(1) {
            found[idx] = later;
        }
    }

    let get = |kind: PatternKind| found.iter().find(|m| m.kind == kind).copied();

    let date = get(PatternKind::Date).and_then(|m| parse_date(m.value));
    let year = get(PatternKind::Year).and_then(|m| m.value.parse::<u16>().ok());

    let (season, episodes) = match kind {
        MediaKind::Series => resolve_episodes(
            get(PatternKind::Season),
            get(PatternKind::Episode),
            get(PatternKind::Identifier),
            get(PatternKind::Date),
        ),
        MediaKind::Movie => (None, Vec::new()),
    };

    let structural: &[PatternKind] = match kind {
        MediaKind::Series => &[
            PatternKind::Season,
            PatternKind::Episode,
            PatternKind::Identifier,
            PatternKind::Date,
            PatternKind::Year,
        ],
        MediaKind::Movie => &[PatternKind::Date, PatternKind::Year],
    };
    let title_end = found
        .iter()
        .filter(|m| structural.contains(&m.kind) && m.start > 0)
        .map(|m| m.start)
        .min();
    let title = extract_title(name, title_end);

    let resolved = season.is_some() && !episodes.is_empty();
    let unresolved = kind == MediaKind::Series && !resolved && date.is_none();

    let (episodes, identifier) = if unresolved {
        (vec![UNRESOLVED], UNRESOLVED.to_string())
    } else {
        let identifier = derive_identifier(kind, season, &episodes, date);
        (episodes, identifier)
    };

    let mut flags = ReleaseFlags::default();
    for caps in FLAG_RE.captures_iter(name) {
        match caps[1].to_lowercase().as_str() {
            "proper" => flags.proper = true,
            "extended" => flags.extended = true,
            _ => flags.repack = true,
        }
    }

    let mut languages: Vec<String> = Vec::new();
    for caps in LANGUAGE_RE.captures_iter(name) {
        let lang = normalize_language(&caps[1]);
        if !languages.iter().any(|l| l == lang) {
            languages.push(lang.to_string());
        }
    }

    let external_ids = ExternalIds {
        imdb: get(PatternKind::Imdb).map(|m| m.value.to_lowercase()),
        tvdb: get(PatternKind::Tvdb).map(|m| m.value[4..].to_string()),
    };

    let mut audio = get(PatternKind::Audio).map(|m| m.value.trim_end_matches('.').to_string());
    let (mut resolution, mut quality, mut codec) = (None, None, None);
    if let Some(profile) = profile {
        for category in QualityCategory::ALL {
            let Some(group) = profile.best_group(category, raw) else {
                continue;
            };
            let slot = match category {
                QualityCategory::Resolution => &mut resolution,
                QualityCategory::Quality => &mut quality,
                QualityCategory::Codec => &mut codec,
                QualityCategory::Audio => &mut audio,
            };
            *slot = Some(group.name.clone());
        }
    }

    let result = ParsedRelease {
        raw: raw.to_string(),
        kind,
        title,
        year,
        season: if unresolved { None } else { season },
        episodes,
        identifier,
        date,
        resolution,
        quality,
        codec,
        audio,
        languages,
        flags,
        external_ids,
        file,
        unresolved,
    };

    debug!(
        raw = raw,
        kind = %kind,
        title = %result.title,
        identifier = %result.identifier,
        year = ?result.year,
        unresolved = result.unresolved,
        "Parsed release"
    );

    result
}

/// Season plus the ordered episode list of a series release
fn resolve_episodes(
    season: Option<PatternMatch<'_>>,
    episode: Option<PatternMatch<'_>>,
    identifier: Option<PatternMatch<'_>>,
    date: Option<PatternMatch<'_>>,
) -> (Option<i32>, Vec<i32>) {
    // Date-shaped identifiers ("2024-01-15") carry no episode numbers.
    let identifier = identifier.filter(|id| date.is_none_or(|d| d.start != id.start));
    if let Some(id) = identifier {
        if let Some(caps) = IDENTIFIER_SEASON_RE.captures(id.value) {
            let season_end = caps.get(0).map_or(0, |m| m.end());
            let episodes = episodes_from_segments(&id.value[season_end..]);
            if !episodes.is_empty() {
                let season_num = caps[1].parse::<i32>().ok();
                return (season_num, episodes);
            }
        }
    }

    let season = season.and_then(|m| m.value.parse::<i32>().ok());
    let episodes = episode
        .and_then(|m| m.value.parse::<i32>().ok())
        .into_iter()
        .collect();
    (season, episodes)
}

/// "E01E02" -> [1, 2]; "E01-E03" and "E01-03" -> [1, 2, 3]
fn episodes_from_segments(segments: &str) -> Vec<i32> {
    let mut episodes: Vec<i32> = Vec::new();
    for caps in EPISODE_SEGMENT_RE.captures_iter(segments) {
        let Ok(number) = caps[3].parse::<i32>() else {
            continue;
        };
        let is_range = caps.get(1).is_some() || &caps[2] == "-";
        match episodes.last().copied() {
            Some(prev) if is_range && number > prev => episodes.extend(prev + 1..=number),
            _ => episodes.push(number),
        }
    }
    episodes
}

/// Normalize a date token ("2026.01.07", "26-1-7") into a calendar date
fn parse_date(value: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = value
        .split(|c: char| !c.is_ascii_digit())
        .filter(|p| !p.is_empty())
        .collect();
    let [y, m, d] = parts.as_slice() else {
        return None;
    };
    let mut year: i32 = y.parse().ok()?;
    if y.len() == 2 {
        year += 2000;
    } else if y.len() != 4 {
        return None;
    }
    NaiveDate::from_ymd_opt(year, m.parse().ok()?, d.parse().ok()?)
}

fn derive_identifier(
    kind: MediaKind,
    season: Option<i32>,
    episodes: &[i32],
    date: Option<NaiveDate>,
) -> String {
    if kind == MediaKind::Movie {
        return String::new();
    }
    match (season, episodes.is_empty(), date) {
        (Some(season), false, _) => {
            let mut id = format!("S{:02}", season);
            for ep in episodes {
                id.push_str(&format!("E{:02}", ep));
            }
            id
        }
        (_, _, Some(date)) => date.format("%Y-%m-%d").to_string(),
        _ => String::new(),
    }
}

fn extract_title(name: &str, end: Option<usize>) -> String {
    let candidate = end.map_or(name, |end| &name[..end]);
    let candidate = match end {
        Some(_) => candidate,
        None => TITLE_STOP_RE
            .captures(candidate)
            .and_then(|c| c.get(1))
            .filter(|m| m.start() > 0)
            .map_or(candidate, |m| &candidate[..m.start()]),
    };
    let title = clean_title(candidate);
    if title.is_empty() {
        // Nothing before the first structural token; fall back to the text before quality tokens
        let fallback = TITLE_STOP_RE
            .captures(name)
            .and_then(|c| c.get(1))
            .filter(|m| m.start() > 0)
            .map_or(name, |m| &name[..m.start()]);
        return clean_title(fallback);
    }
    title
}

/// Replace scene separators with spaces and collapse whitespace
fn clean_title(s: &str) -> String {
    s.replace(['.', '_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
