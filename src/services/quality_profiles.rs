//! Quality profile definitions and their compiled form
//!
//! A profile is a named policy: prioritized groups for each quality category
//! plus required/rejected regex gates. Profiles arrive from configuration as
//! plain data ([QualityProfile]) and are compiled once into a
//! [CompiledProfile] that the matcher reads without further allocation of
//! regexes. Compile failures stay attached to the pattern that caused them.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PatternCompileError;
use crate::services::patterns::{compile_case_insensitive, contains_token};

/// Categories scored independently by the matcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCategory {
    Resolution,
    /// Source quality (BluRay, WEB-DL, HDTV, ...)
    Quality,
    Codec,
    Audio,
}

impl QualityCategory {
    pub const ALL: [QualityCategory; 4] = [
        QualityCategory::Resolution,
        QualityCategory::Quality,
        QualityCategory::Codec,
        QualityCategory::Audio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityCategory::Resolution => "resolution",
            QualityCategory::Quality => "quality",
            QualityCategory::Codec => "codec",
            QualityCategory::Audio => "audio",
        }
    }
}

impl std::fmt::Display for QualityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One prioritized entry of a category, e.g. `{name: "1080p", priority: 3}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityGroup {
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    /// Literal tokens; when empty the group name itself is the token
    #[serde(default, alias = "matchStrings")]
    pub match_strings: Vec<String>,
    #[serde(default, alias = "matchRegex")]
    pub match_regex: Vec<String>,
    #[serde(default, alias = "useRegex")]
    pub use_regex: bool,
}

/// Per-category multipliers for the composite score.
///
/// The composite is `Σ weight(category) × priority` over matched categories.
/// With the default of 1 everywhere it is the plain sum of priorities.
/// Weights are unsigned, so a higher priority in one category can never
/// lower the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub resolution: u32,
    pub quality: u32,
    pub codec: u32,
    pub audio: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            resolution: 1,
            quality: 1,
            codec: 1,
            audio: 1,
        }
    }
}

impl ScoreWeights {
    pub fn weight(&self, category: QualityCategory) -> u32 {
        match category {
            QualityCategory::Resolution => self.resolution,
            QualityCategory::Quality => self.quality,
            QualityCategory::Codec => self.codec,
            QualityCategory::Audio => self.audio,
        }
    }

    pub fn contribution(&self, category: QualityCategory, priority: i32) -> i64 {
        i64::from(self.weight(category)) * i64::from(priority)
    }
}

/// A quality profile as stored in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityProfile {
    pub name: String,
    #[serde(default)]
    pub resolution: Vec<QualityGroup>,
    #[serde(default)]
    pub quality: Vec<QualityGroup>,
    #[serde(default)]
    pub codec: Vec<QualityGroup>,
    #[serde(default)]
    pub audio: Vec<QualityGroup>,
    #[serde(default, alias = "requiredPatterns")]
    pub required_patterns: Vec<String>,
    #[serde(default, alias = "rejectedPatterns")]
    pub rejected_patterns: Vec<String>,
    /// Name of a shared regex config whose gates are appended to this profile's
    #[serde(default)]
    pub regex_config: Option<String>,
    #[serde(default)]
    pub weights: ScoreWeights,
}

impl QualityProfile {
    pub fn groups(&self, category: QualityCategory) -> &[QualityGroup] {
        match category {
            QualityCategory::Resolution => &self.resolution,
            QualityCategory::Quality => &self.quality,
            QualityCategory::Codec => &self.codec,
            QualityCategory::Audio => &self.audio,
        }
    }
}

/// A reusable named set of required/rejected gates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexConfig {
    pub name: String,
    #[serde(default, alias = "required_patterns", alias = "requiredPatterns")]
    pub required: Vec<String>,
    #[serde(default, alias = "rejected_patterns", alias = "rejectedPatterns")]
    pub rejected: Vec<String>,
}

// =============================================================================
// Compiled form
// =============================================================================

/// A user pattern with its compile outcome
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    pub pattern: String,
    compiled: Result<Regex, PatternCompileError>,
}

impl CompiledPattern {
    pub fn compile(pattern: &str) -> Self {
        let compiled = compile_case_insensitive(pattern);
        if let Err(ref e) = compiled {
            warn!(pattern = pattern, error = %e.message, "Failed to compile pattern");
        }
        Self {
            pattern: pattern.to_string(),
            compiled,
        }
    }

    /// The first matching text, or the compile error of this pattern
    pub fn find<'h>(&self, haystack: &'h str) -> Result<Option<&'h str>, &PatternCompileError> {
        match &self.compiled {
            Ok(re) => Ok(re.find(haystack).map(|m| m.as_str())),
            Err(e) => Err(e),
        }
    }

    pub fn error(&self) -> Option<&PatternCompileError> {
        self.compiled.as_ref().err()
    }
}

/// How a group decides whether a release belongs to it
#[derive(Debug, Clone)]
pub enum GroupMatcher {
    Tokens(Vec<String>),
    Patterns(Vec<CompiledPattern>),
}

/// Outcome of testing one group against a release name
#[derive(Debug, Clone, Default)]
pub struct GroupEvaluation {
    /// The token or matched text that selected the group
    pub matched: Option<String>,
    pub errors: Vec<PatternCompileError>,
}

#[derive(Debug, Clone)]
pub struct CompiledGroup {
    pub name: String,
    pub priority: i32,
    pub matcher: GroupMatcher,
}

impl CompiledGroup {
    fn compile(group: &QualityGroup) -> Self {
        let matcher = if group.use_regex && !group.match_regex.is_empty() {
            GroupMatcher::Patterns(group.match_regex.iter().map(|p| CompiledPattern::compile(p)).collect())
        } else if group.match_strings.is_empty() {
            GroupMatcher::Tokens(vec![group.name.clone()])
        } else {
            GroupMatcher::Tokens(group.match_strings.clone())
        };
        Self {
            name: group.name.clone(),
            priority: group.priority,
            matcher,
        }
    }

    /// Test this group against `raw`; a broken pattern is reported, not fatal.
    pub fn evaluate(&self, raw: &str) -> GroupEvaluation {
        let mut evaluation = GroupEvaluation::default();
        match &self.matcher {
            GroupMatcher::Tokens(tokens) => {
                evaluation.matched = tokens.iter().find(|t| contains_token(raw, t)).cloned();
            }
            GroupMatcher::Patterns(patterns) => {
                for pattern in patterns {
                    match pattern.find(raw) {
                        Ok(Some(text)) => {
                            evaluation.matched = Some(text.to_string());
                            break;
                        }
                        Ok(None) => {}
                        Err(e) => evaluation.errors.push(e.clone()),
                    }
                }
            }
        }
        evaluation
    }

    pub fn is_match(&self, raw: &str) -> bool {
        self.evaluate(raw).matched.is_some()
    }
}

/// A profile ready for matching.
///
/// Groups of each category are kept in descending priority; groups with equal
/// priority keep their configured order.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub name: String,
    categories: Vec<(QualityCategory, Vec<CompiledGroup>)>,
    required: Vec<CompiledPattern>,
    rejected: Vec<CompiledPattern>,
    weights: ScoreWeights,
}

impl CompiledProfile {
    /// Compile a profile, appending the gates of its shared regex config if given
    pub fn compile(profile: &QualityProfile, shared: Option<&RegexConfig>) -> Self {
        let categories = QualityCategory::ALL
            .into_iter()
            .map(|category| {
                let mut groups: Vec<CompiledGroup> =
                    profile.groups(category).iter().map(CompiledGroup::compile).collect();
                groups.sort_by(|a, b| b.priority.cmp(&a.priority));
                (category, groups)
            })
            .collect();

        let shared_required = shared.map(|r| r.required.as_slice()).unwrap_or_default();
        let shared_rejected = shared.map(|r| r.rejected.as_slice()).unwrap_or_default();

        Self {
            name: profile.name.clone(),
            categories,
            required: profile
                .required_patterns
                .iter()
                .chain(shared_required)
                .map(|p| CompiledPattern::compile(p))
                .collect(),
            rejected: profile
                .rejected_patterns
                .iter()
                .chain(shared_rejected)
                .map(|p| CompiledPattern::compile(p))
                .collect(),
            weights: profile.weights,
        }
    }

    pub fn groups(&self, category: QualityCategory) -> &[CompiledGroup] {
        self.categories
            .iter()
            .find(|(c, _)| *c == category)
            .map(|(_, groups)| groups.as_slice())
            .unwrap_or_default()
    }

    /// Highest-priority group of `category` that matches `raw`
    pub fn best_group(&self, category: QualityCategory, raw: &str) -> Option<&CompiledGroup> {
        self.groups(category).iter().find(|g| g.is_match(raw))
    }

    pub fn required(&self) -> &[CompiledPattern] {
        &self.required
    }

    pub fn rejected(&self) -> &[CompiledPattern] {
        &self.rejected
    }

    pub fn weights(&self) -> &ScoreWeights {
        &self.weights
    }

    /// Every pattern of this profile that failed to compile
    pub fn compile_errors(&self) -> Vec<&PatternCompileError> {
        let group_patterns = self.categories.iter().flat_map(|(_, groups)| {
            groups.iter().flat_map(|g| match &g.matcher {
                GroupMatcher::Patterns(patterns) => patterns.as_slice(),
                GroupMatcher::Tokens(_) => &[][..],
            })
        });
        self.required
            .iter()
            .chain(self.rejected.iter())
            .chain(group_patterns)
            .filter_map(CompiledPattern::error)
            .collect()
    }
}
