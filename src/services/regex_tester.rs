//! Regex self-test
//!
//! Runs a test string through the global patterns, a shared regex config
//! and/or a quality profile and reports one row per pattern. Used by
//! configuration tooling to check what a pattern actually matches before
//! saving it. Bad patterns show up as rows with an `error`.

use serde::{Deserialize, Serialize};

use crate::config::ConfigSnapshot;
use crate::services::patterns::{contains_token, global_patterns};
use crate::services::quality_profiles::{CompiledPattern, GroupMatcher, QualityCategory};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegexTestRequest {
    pub test_string: String,
    #[serde(default)]
    pub selected_regex_config: Option<String>,
    #[serde(default)]
    pub selected_quality_config: Option<String>,
    #[serde(default = "default_true")]
    pub test_global: bool,
    #[serde(default)]
    pub test_regex_config: bool,
    #[serde(default)]
    pub test_quality_config: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegexTestRow {
    /// `global`, `required`, `rejected`, a quality category, or `config`
    #[serde(rename = "type")]
    pub row_type: String,
    pub name: String,
    pub pattern: String,
    #[serde(rename = "match")]
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RegexTestRow {
    fn new(row_type: &str, name: &str, pattern: &str) -> Self {
        Self {
            row_type: row_type.to_string(),
            name: name.to_string(),
            pattern: pattern.to_string(),
            matched: false,
            match_string: None,
            error: None,
        }
    }

    fn from_pattern(row_type: &str, name: &str, pattern: &CompiledPattern, test: &str) -> Self {
        let mut row = Self::new(row_type, name, &pattern.pattern);
        match pattern.find(test) {
            Ok(found) => {
                row.matched = found.is_some();
                row.match_string = found.map(str::to_string);
            }
            Err(e) => row.error = Some(e.message.clone()),
        }
        row
    }

    fn missing(kind: &str, name: &str) -> Self {
        let mut row = Self::new("config", name, "");
        row.error = Some(format!("{} '{}' is not configured", kind, name));
        row
    }
}

/// Run the requested checks against `snapshot`
pub fn run_regex_test(request: &RegexTestRequest, snapshot: &ConfigSnapshot) -> Vec<RegexTestRow> {
    let test = request.test_string.as_str();
    let mut rows = Vec::new();

    if request.test_global {
        for pattern in global_patterns() {
            let mut row = RegexTestRow::new("global", pattern.kind.as_str(), pattern.pattern);
            if let Some(found) = pattern.find(test) {
                row.matched = true;
                row.match_string = Some(found.value.to_string());
            }
            rows.push(row);
        }
    }

    if request.test_regex_config {
        if let Some(ref name) = request.selected_regex_config {
            match snapshot.regex_config(name) {
                Some(config) => {
                    for pattern in &config.required {
                        let compiled = CompiledPattern::compile(pattern);
                        rows.push(RegexTestRow::from_pattern("required", name, &compiled, test));
                    }
                    for pattern in &config.rejected {
                        let compiled = CompiledPattern::compile(pattern);
                        rows.push(RegexTestRow::from_pattern("rejected", name, &compiled, test));
                    }
                }
                None => rows.push(RegexTestRow::missing("regex config", name)),
            }
        }
    }

    if request.test_quality_config {
        if let Some(ref name) = request.selected_quality_config {
            match snapshot.profile(name) {
                Some(profile) => {
                    for category in QualityCategory::ALL {
                        for group in profile.groups(category) {
                            match &group.matcher {
                                GroupMatcher::Patterns(patterns) => {
                                    for pattern in patterns {
                                        rows.push(RegexTestRow::from_pattern(
                                            category.as_str(),
                                            &group.name,
                                            pattern,
                                            test,
                                        ));
                                    }
                                }
                                GroupMatcher::Tokens(tokens) => {
                                    for token in tokens {
                                        let mut row =
                                            RegexTestRow::new(category.as_str(), &group.name, token);
                                        row.matched = contains_token(test, token);
                                        row.match_string = row.matched.then(|| token.clone());
                                        rows.push(row);
                                    }
                                }
                            }
                        }
                    }
                    for pattern in profile.required() {
                        rows.push(RegexTestRow::from_pattern("required", name, pattern, test));
                    }
                    for pattern in profile.rejected() {
                        rows.push(RegexTestRow::from_pattern("rejected", name, pattern, test));
                    }
                }
                None => rows.push(RegexTestRow::missing("quality profile", name)),
            }
        }
    }

    rows
}
