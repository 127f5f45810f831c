//! Quality evaluation service
//!
//! Scores a parsed release against a compiled quality profile.
//! Used by:
//! - The naming pipeline to accept or reject a file before it is renamed
//! - Ranking of competing releases for the same item
//! - The regex self-test endpoint (through the profile's compiled groups)
//!
//! Evaluation order is fixed: required gates, rejected gates, then the score
//! pass. A pattern that failed to compile is reported in `pattern_errors` and
//! skipped; it never aborts the remaining checks.

use serde::Serialize;
use tracing::debug;

use crate::error::{CoreError, PatternCompileError};
use crate::services::quality_profiles::{CompiledProfile, QualityCategory};
use crate::services::release_parser::ParsedRelease;

/// The group that won a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedGroup {
    pub name: String,
    pub priority: i32,
    /// Token or text that selected the group
    pub matched: String,
}

/// Per-category slot of a [PriorityResult]; `group` is `None` when nothing matched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryMatch {
    pub category: QualityCategory,
    pub group: Option<MatchedGroup>,
}

/// Result of scoring one release against one profile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityResult {
    pub profile: String,
    /// Composite score; zero when rejected
    pub score: i64,
    /// One entry per category, in category order
    pub matched_groups: Vec<CategoryMatch>,
    pub rejected: bool,
    /// The pattern that caused the rejection
    pub rejection_reason: Option<String>,
    pub pattern_errors: Vec<PatternCompileError>,
    #[serde(skip)]
    rejection: Option<CoreError>,
}

impl PriorityResult {
    fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
            score: 0,
            matched_groups: Vec::new(),
            rejected: false,
            rejection_reason: None,
            pattern_errors: Vec::new(),
            rejection: None,
        }
    }

    fn reject(&mut self, error: CoreError, pattern: &str) {
        self.rejected = true;
        self.rejection_reason = Some(pattern.to_string());
        self.rejection = Some(error);
    }

    /// The typed rejection (`RequiredPatternMissing` / `RejectedPatternMatched`)
    pub fn rejection(&self) -> Option<&CoreError> {
        self.rejection.as_ref()
    }

    /// Winning group of a category, if any
    pub fn group(&self, category: QualityCategory) -> Option<&MatchedGroup> {
        self.matched_groups
            .iter()
            .find(|m| m.category == category)
            .and_then(|m| m.group.as_ref())
    }
}

/// Service for scoring releases against quality profiles
pub struct QualityEvaluator;

impl QualityEvaluator {
    /// Evaluate `raw` (and its parsed form) against `profile`
    pub fn match_release(
        parsed: &ParsedRelease,
        raw: &str,
        profile: &CompiledProfile,
    ) -> PriorityResult {
        let raw = if raw.is_empty() { parsed.raw() } else { raw };
        let mut result = PriorityResult::new(&profile.name);

        // Required gates: every pattern must match
        for required in profile.required() {
            match required.find(raw) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    if !result.rejected {
                        result.reject(
                            CoreError::RequiredPatternMissing(required.pattern.clone()),
                            &required.pattern,
                        );
                    }
                }
                Err(e) => result.pattern_errors.push(e.clone()),
            }
        }

        // Rejected gates: no pattern may match
        for rejected in profile.rejected() {
            match rejected.find(raw) {
                Ok(None) => {}
                Ok(Some(_)) => {
                    if !result.rejected {
                        result.reject(
                            CoreError::RejectedPatternMatched(rejected.pattern.clone()),
                            &rejected.pattern,
                        );
                    }
                }
                Err(e) => result.pattern_errors.push(e.clone()),
            }
        }

        if result.rejected {
            debug!(
                title = parsed.title(),
                identifier = parsed.identifier(),
                profile = %profile.name,
                reason = ?result.rejection_reason,
                "Release rejected by profile"
            );
            return result;
        }

        // Score pass: per category, first match in descending priority wins
        for category in QualityCategory::ALL {
            let mut winner = None;
            for group in profile.groups(category) {
                let evaluation = group.evaluate(raw);
                result.pattern_errors.extend(evaluation.errors);
                if let Some(matched) = evaluation.matched {
                    winner = Some(MatchedGroup {
                        name: group.name.clone(),
                        priority: group.priority,
                        matched,
                    });
                    break;
                }
            }
            if let Some(ref group) = winner {
                result.score += profile.weights().contribution(category, group.priority);
            }
            result.matched_groups.push(CategoryMatch {
                category,
                group: winner,
            });
        }

        debug!(
            title = parsed.title(),
            identifier = parsed.identifier(),
            profile = %profile.name,
            score = result.score,
            "Scored release"
        );

        result
    }

    /// Whether `candidate` should replace `existing`
    pub fn is_upgrade(existing: &PriorityResult, candidate: &PriorityResult) -> bool {
        !candidate.rejected && (existing.rejected || candidate.score > existing.score)
    }

    /// Index of the best accepted result; ties keep the earliest candidate
    pub fn best_candidate(results: &[PriorityResult]) -> Option<usize> {
        results
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.rejected)
            .fold(None, |best: Option<(usize, i64)>, (idx, r)| match best {
                Some((_, score)) if score >= r.score => best,
                _ => Some((idx, r.score)),
            })
            .map(|(idx, _)| idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::quality_profiles::{QualityGroup, QualityProfile};
    use crate::services::release_parser::{MediaKind, parse_release};
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn group(name: &str, priority: i32) -> QualityGroup {
        QualityGroup {
            name: name.to_string(),
            priority,
            ..Default::default()
        }
    }

    fn hd_profile() -> QualityProfile {
        QualityProfile {
            name: "HD".to_string(),
            resolution: vec![group("720p", 2), group("1080p", 3), group("2160p", 4)],
            quality: vec![group("HDTV", 1), group("WEB-DL", 4), group("BluRay", 5)],
            codec: vec![group("x264", 1), group("x265", 2)],
            audio: vec![],
            ..Default::default()
        }
    }

    fn evaluate(raw: &str, profile: &QualityProfile) -> PriorityResult {
        let compiled = CompiledProfile::compile(profile, None);
        let parsed = parse_release(raw, MediaKind::Series);
        QualityEvaluator::match_release(&parsed, raw, &compiled)
    }

    // =========================================================================
    // Score Pass Tests
    // =========================================================================

    #[test]
    fn test_resolution_group_contributes_priority() {
        let profile = QualityProfile {
            name: "Only1080".to_string(),
            resolution: vec![group("1080p", 3)],
            ..Default::default()
        };
        let result = evaluate("Breaking.Bad.S01E01.1080p.BluRay.x264-GROUP", &profile);
        assert!(!result.rejected);
        assert_eq!(result.score, 3);
        let resolution = result.group(QualityCategory::Resolution).unwrap();
        assert_eq!(resolution.name, "1080p");
        assert_eq!(resolution.priority, 3);
    }

    #[test]
    fn test_composite_is_sum_of_categories() {
        let result = evaluate("Breaking.Bad.S01E01.1080p.BluRay.x264-GROUP", &hd_profile());
        assert_eq!(result.score, 3 + 5 + 1);
        assert_eq!(result.matched_groups.len(), 4);
        assert_eq!(result.group(QualityCategory::Audio), None);
    }

    #[test]
    fn test_highest_priority_group_wins() {
        // Both tokens present; the higher priority group is tested first
        let result = evaluate("Show.S01E01.720p.1080p.HDTV", &hd_profile());
        assert_eq!(result.group(QualityCategory::Resolution).unwrap().name, "1080p");
    }

    #[test]
    fn test_better_match_never_lowers_score() {
        let low = evaluate("Show.S01E01.720p.HDTV.x264", &hd_profile());
        let high = evaluate("Show.S01E01.2160p.HDTV.x264", &hd_profile());
        assert!(high.score > low.score);
        assert!(QualityEvaluator::is_upgrade(&low, &high));
        assert!(!QualityEvaluator::is_upgrade(&high, &low));
    }

    #[test]
    fn test_weights_scale_categories() {
        let mut profile = hd_profile();
        profile.weights.resolution = 100;
        let result = evaluate("Show.S01E01.1080p.HDTV.x264", &profile);
        assert_eq!(result.score, 300 + 1 + 1);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let raw = "Show.S01E01.1080p.WEB-DL.x265";
        assert_eq!(evaluate(raw, &hd_profile()), evaluate(raw, &hd_profile()));
    }

    // =========================================================================
    // Gate Tests
    // =========================================================================

    #[test]
    fn test_required_pattern_missing_rejects() {
        let profile = QualityProfile {
            name: "UHD".to_string(),
            required_patterns: vec!["2160p".to_string()],
            ..Default::default()
        };
        let result = evaluate("Movie.1080p.mkv", &profile);
        assert!(result.rejected);
        assert_eq!(result.rejection_reason.as_deref(), Some("2160p"));
        assert_matches!(result.rejection(), Some(CoreError::RequiredPatternMissing(p)) if p == "2160p");
        assert_eq!(result.score, 0);
        assert!(result.matched_groups.is_empty());
    }

    #[test]
    fn test_required_patterns_are_case_insensitive() {
        let profile = QualityProfile {
            name: "UHD".to_string(),
            required_patterns: vec!["2160P".to_string()],
            ..Default::default()
        };
        assert!(!evaluate("movie.2160p.mkv", &profile).rejected);
    }

    #[test]
    fn test_rejected_pattern_matched_rejects() {
        let profile = QualityProfile {
            name: "NoCam".to_string(),
            rejected_patterns: vec!["CAM".to_string()],
            ..Default::default()
        };
        let result = evaluate("New.Movie.2024.CAM.x264", &profile);
        assert!(result.rejected);
        assert_eq!(result.rejection_reason.as_deref(), Some("CAM"));
        assert_matches!(result.rejection(), Some(CoreError::RejectedPatternMatched(_)));
    }

    #[test]
    fn test_bad_pattern_does_not_abort_evaluation() {
        let mut profile = hd_profile();
        profile.required_patterns = vec!["(broken".to_string(), "1080p".to_string()];
        profile.rejected_patterns = vec!["[bad".to_string(), "cam".to_string()];
        let result = evaluate("Show.S01E01.1080p.HDTV.x264", &profile);
        assert!(!result.rejected);
        assert_eq!(result.score, 3 + 1 + 1);
        let broken: Vec<_> = result.pattern_errors.iter().map(|e| e.pattern.as_str()).collect();
        assert_eq!(broken, vec!["(broken", "[bad"]);
    }

    // =========================================================================
    // Ranking Tests
    // =========================================================================

    #[test]
    fn test_best_candidate_skips_rejected() {
        let mut profile = hd_profile();
        profile.rejected_patterns = vec!["cam".to_string()];
        let results = vec![
            evaluate("Show.S01E01.720p.HDTV", &profile),
            evaluate("Show.S01E01.2160p.CAM", &profile),
            evaluate("Show.S01E01.1080p.BluRay", &profile),
            evaluate("Show.S01E01.1080p.BluRay.PROPER", &profile),
        ];
        assert_eq!(QualityEvaluator::best_candidate(&results), Some(2));
        assert_eq!(QualityEvaluator::best_candidate(&[]), None);
    }
}
