//! Static template verification
//!
//! Checks a template against the field catalog of its context type without
//! rendering it. Problems are reported as messages so authoring tools can show
//! them inline; nothing here fails with an error.
//!
//! The check runs in a fixed order:
//! 1. plain-text detection (no `{{` and no `}}` at all)
//! 2. brace balance and triple-brace detection; either stops the check
//! 3. every `{{...}}` reference is classified and field references are
//!    looked up in the schema, with a "did you mean" suggestion when a close
//!    enough known field exists
//! 4. non-blocking advisories, appended to the suggestions

use serde::Serialize;

use crate::error::CoreError;
use crate::services::naming::schema::{SchemaType, schema};
use crate::services::text_utils::similarity;

/// Minimum score a known field needs before it is suggested
const SUGGESTION_THRESHOLD: u32 = 50;

const MSG_VALID: &str = "Template syntax is valid";
const MSG_INVALID: &str = "Template validation failed";
const MSG_PLAIN_TEXT: &str =
    "Template appears to be plain text without any template fields. Use {{.FieldName}} to insert values";

/// Outcome of [verify]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub message: String,
    pub errors: Vec<String>,
    pub suggestions: Vec<String>,
}

impl VerificationResult {
    fn finish(errors: Vec<String>, suggestions: Vec<String>) -> Self {
        let valid = errors.is_empty();
        Self {
            valid,
            message: if valid { MSG_VALID } else { MSG_INVALID }.to_string(),
            errors,
            suggestions,
        }
    }
}

/// Words that open a control construct or call a builtin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKeyword {
    Range,
    If,
    Else,
    End,
    With,
    Printf,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ControlKeyword {
    const ALL: [ControlKeyword; 12] = [
        ControlKeyword::Range,
        ControlKeyword::If,
        ControlKeyword::Else,
        ControlKeyword::End,
        ControlKeyword::With,
        ControlKeyword::Printf,
        ControlKeyword::Eq,
        ControlKeyword::Ne,
        ControlKeyword::Lt,
        ControlKeyword::Le,
        ControlKeyword::Gt,
        ControlKeyword::Ge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKeyword::Range => "range",
            ControlKeyword::If => "if",
            ControlKeyword::Else => "else",
            ControlKeyword::End => "end",
            ControlKeyword::With => "with",
            ControlKeyword::Printf => "printf",
            ControlKeyword::Eq => "eq",
            ControlKeyword::Ne => "ne",
            ControlKeyword::Lt => "lt",
            ControlKeyword::Le => "le",
            ControlKeyword::Gt => "gt",
            ControlKeyword::Ge => "ge",
        }
    }

    /// Keyword that starts `body`: the whole body or the body's first word
    fn leading(body: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kw| {
            let word = kw.as_str();
            body == word
                || body
                    .strip_prefix(word)
                    .is_some_and(|rest| rest.starts_with(' '))
        })
    }
}

/// What a `{{...}}` body is, decided in priority order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceKind {
    Control(ControlKeyword),
    /// Contains `:=`
    Assignment,
    /// Starts with `$`
    Variable,
    /// A field path, without its leading dot
    Field(String),
    /// Anything else (a lone `.`, literals, unknown words)
    Other,
}

/// One `{{...}}` occurrence of a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReference {
    /// Trimmed text between the braces
    pub body: String,
    /// Byte offset of the opening braces
    pub offset: usize,
    pub kind: ReferenceKind,
}

/// Classify a trimmed reference body
pub fn classify_reference(body: &str) -> ReferenceKind {
    if let Some(keyword) = ControlKeyword::leading(body) {
        return ReferenceKind::Control(keyword);
    }
    if body.contains(":=") {
        return ReferenceKind::Assignment;
    }
    if body.starts_with('$') {
        return ReferenceKind::Variable;
    }
    body.split_whitespace()
        .find(|token| token.starts_with('.') && token.len() > 1)
        .map(|token| ReferenceKind::Field(token[1..].to_string()))
        .unwrap_or(ReferenceKind::Other)
}

/// Every `{{...}}` occurrence, left to right
pub fn extract_references(template: &str) -> Vec<TemplateReference> {
    let mut references = Vec::new();
    let mut from = 0;
    while let Some(open) = template[from..].find("{{").map(|p| from + p) {
        let body_start = open + 2;
        let Some(close) = template[body_start..].find("}}").map(|p| body_start + p) else {
            break;
        };
        let body = template[body_start..close].trim();
        references.push(TemplateReference {
            body: body.to_string(),
            offset: open,
            kind: classify_reference(body),
        });
        from = close + 2;
    }
    references
}

/// Highest scoring known field; ties go to the alphabetically first path
fn closest_field<'a>(field: &str, known: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut best: Option<(&str, u32)> = None;
    for candidate in known {
        let score = similarity(field, candidate);
        if score > best.map_or(0, |(_, s)| s) {
            best = Some((candidate, score));
        }
    }
    best.filter(|(_, score)| *score > SUGGESTION_THRESHOLD)
        .map(|(path, _)| path)
}

/// Check a template against the field catalog of `schema_type`
pub fn verify(template: &str, schema_type: SchemaType) -> VerificationResult {
    let opens = template.matches("{{").count();
    let closes = template.matches("}}").count();

    if opens == 0 && closes == 0 {
        return VerificationResult::finish(vec![MSG_PLAIN_TEXT.to_string()], Vec::new());
    }

    let mut errors = Vec::new();
    if opens != closes {
        errors.push(CoreError::UnbalancedTemplateSyntax("Unmatched template braces".to_string()).to_string());
    }
    if template.contains("{{{") || template.contains("}}}") {
        errors.push(CoreError::UnbalancedTemplateSyntax("Invalid template syntax".to_string()).to_string());
    }
    if !errors.is_empty() {
        return VerificationResult::finish(errors, Vec::new());
    }

    let catalog = schema(schema_type);
    let references = extract_references(template);
    let mut suggestions = Vec::new();

    // One entry per open block; `true` where `range`/`with` rebound dot
    let mut rebound: Vec<bool> = Vec::new();
    for reference in &references {
        let field = match reference.kind {
            ReferenceKind::Control(ControlKeyword::If) => {
                rebound.push(false);
                continue;
            }
            ReferenceKind::Control(ControlKeyword::Range | ControlKeyword::With) => {
                rebound.push(true);
                continue;
            }
            ReferenceKind::Control(ControlKeyword::End) => {
                rebound.pop();
                continue;
            }
            ReferenceKind::Field(ref field) => field,
            _ => continue,
        };
        // Paths inside range/with are relative to the element, not the root
        if catalog.contains(field) || rebound.iter().any(|r| *r) {
            continue;
        }
        errors.push(CoreError::UnknownFieldReference(field.clone()).to_string());
        if let Some(known) = closest_field(field, catalog.known_paths()) {
            suggestions.push(format!("Did you mean '{}'?", known));
        }
    }

    match schema_type {
        SchemaType::Parser => {
            if !template.contains(".Dbmovie.") && !template.contains(".Dbserie.") {
                suggestions.push(
                    "Consider using .Dbmovie.* or .Dbserie.* fields for metadata from the database"
                        .to_string(),
                );
            }
            let has_conditional = references
                .iter()
                .any(|r| r.kind == ReferenceKind::Control(ControlKeyword::If));
            if references.len() > 3 && !has_conditional {
                suggestions.push(
                    "Consider using {{if .Field}}...{{end}} to skip empty optional fields".to_string(),
                );
            }
        }
        SchemaType::Notification => {
            if !template.contains(".Replaced") && !template.contains("range") {
                suggestions.push(
                    "Consider listing replaced files with {{range .Replaced}}{{.}}{{end}}".to_string(),
                );
            }
        }
    }

    VerificationResult::finish(errors, suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::naming::schema::structure_catalog;
    use pretty_assertions::assert_eq;

    // =========================================================================
    // Classification Tests
    // =========================================================================

    #[test]
    fn test_classify_reference_priority() {
        assert_eq!(
            classify_reference("if .Dbmovie.Year"),
            ReferenceKind::Control(ControlKeyword::If)
        );
        assert_eq!(classify_reference("end"), ReferenceKind::Control(ControlKeyword::End));
        assert_eq!(
            classify_reference("printf \"%02d\" .Source.Season"),
            ReferenceKind::Control(ControlKeyword::Printf)
        );
        assert_eq!(classify_reference("$t := .TitleSource"), ReferenceKind::Assignment);
        assert_eq!(classify_reference("$t"), ReferenceKind::Variable);
        assert_eq!(
            classify_reference(".Dbmovie.Title"),
            ReferenceKind::Field("Dbmovie.Title".to_string())
        );
        assert_eq!(
            classify_reference("lower .Dbmovie.Title"),
            ReferenceKind::Field("Dbmovie.Title".to_string())
        );
        assert_eq!(classify_reference("."), ReferenceKind::Other);
        // A keyword prefix of a longer word is not a keyword
        assert_eq!(
            classify_reference("endless .X"),
            ReferenceKind::Field("X".to_string())
        );
    }

    #[test]
    fn test_extract_references_offsets() {
        let refs = extract_references("{{.A}} and {{ .B }}");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].offset, 0);
        assert_eq!(refs[1].body, ".B");
        assert_eq!(refs[1].offset, 11);
    }

    // =========================================================================
    // Verification Tests
    // =========================================================================

    #[test]
    fn test_valid_movie_template() {
        let result = verify("{{.Dbmovie.Title}} ({{.Dbmovie.Year}})", SchemaType::Parser);
        assert!(result.valid);
        assert_eq!(result.message, "Template syntax is valid");
        assert!(result.errors.is_empty());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_unknown_field_gets_suggestion() {
        let result = verify("{{.Dbmovie.Titl}}", SchemaType::Parser);
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Unknown field reference: Dbmovie.Titl"]);
        assert!(result.suggestions.contains(&"Did you mean 'Dbmovie.Title'?".to_string()));
    }

    #[test]
    fn test_field_lookup_is_case_sensitive() {
        let result = verify("{{.Dbmovie.title}}", SchemaType::Parser);
        assert!(!result.valid);
        // Case-insensitive similarity still finds the intended field
        assert_eq!(result.suggestions[0], "Did you mean 'Dbmovie.Title'?");
    }

    #[test]
    fn test_unmatched_braces() {
        let result = verify("{{.Dbmovie.Title}", SchemaType::Parser);
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Unmatched template braces"]);
    }

    #[test]
    fn test_unmatched_opening_braces_only() {
        let result = verify("{{ {{ {{", SchemaType::Parser);
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Unmatched template braces"]);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_triple_braces() {
        let result = verify("{{{.Dbmovie.Title}}}", SchemaType::Parser);
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Invalid template syntax"]);
    }

    #[test]
    fn test_plain_text_is_invalid() {
        let result = verify("The Matrix", SchemaType::Parser);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("Template appears to be plain text"));
    }

    #[test]
    fn test_control_and_variables_are_not_fields() {
        let template = "{{$t := .TitleSource}}{{if .Dbserie.Seriename}}{{$t}}{{end}}";
        let result = verify(template, SchemaType::Parser);
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn test_notification_advisory_for_replaced() {
        let result = verify("{{.Title}} organized to {{.Targetpath}}", SchemaType::Notification);
        assert!(result.valid);
        assert_eq!(result.suggestions.len(), 1);
        assert!(result.suggestions[0].contains(".Replaced"));

        let with_range = verify("{{range .Replaced}}{{.}}{{end}}", SchemaType::Notification);
        assert!(with_range.suggestions.is_empty());
    }

    #[test]
    fn test_parser_advisories() {
        let result = verify(
            "{{.Source.Title}} {{.Source.Identifier}} {{.Source.Resolution}} {{.Source.Codec}}",
            SchemaType::Parser,
        );
        assert!(result.valid);
        assert_eq!(result.suggestions.len(), 2);
    }

    #[test]
    fn test_parser_only_field_rejected_in_notification() {
        let result = verify("{{.TitleSource}}", SchemaType::Notification);
        assert_eq!(result.errors, vec!["Unknown field reference: TitleSource"]);
    }

    #[test]
    fn test_fields_inside_with_and_range_are_relative() {
        let result = verify(
            "{{with .Dbserie}}{{.Seriename}}{{end}} {{range .Source.Languages}}{{.Name}}{{end}}",
            SchemaType::Parser,
        );
        assert!(result.valid, "{:?}", result.errors);

        // Back at the root after `end`
        let result = verify("{{with .Dbserie}}{{.Seriename}}{{end}}{{.Seriename}}", SchemaType::Parser);
        assert_eq!(result.errors, vec!["Unknown field reference: Seriename"]);
    }

    #[test]
    fn test_every_structure_snippet_verifies() {
        for schema_type in [SchemaType::Parser, SchemaType::Notification] {
            for snippet in structure_catalog() {
                let result = verify(snippet.template, schema_type);
                assert!(
                    result.valid,
                    "{} in {}: {:?}",
                    snippet.name,
                    schema_type,
                    result.errors
                );
            }
        }
    }

    // =========================================================================
    // Suggestion Tests
    // =========================================================================

    #[test]
    fn test_suggestion_tie_goes_to_alphabetically_first() {
        // Each candidate shares two of three characters
        let known = ["Abd", "Abc", "Abe"];
        let mut sorted = known.to_vec();
        sorted.sort();
        assert_eq!(similarity("Abx", "Abc"), similarity("Abx", "Abd"));
        assert_eq!(closest_field("Abx", sorted.into_iter()), Some("Abc"));
    }

    #[test]
    fn test_suggestion_needs_more_than_half() {
        // Two of four characters shared: exactly 50
        assert_eq!(similarity("abxy", "abcd"), 50);
        assert_eq!(closest_field("abxy", ["abcd"].into_iter()), None);
        // Three of four: 75
        assert_eq!(closest_field("abcy", ["abcd"].into_iter()), Some("abcd"));
    }

    #[test]
    fn test_catalog_tie_break_prefers_sorted_order() {
        // Dbmovie.Year and Dbserie.Year score alike against a shared typo
        let tie = "Dbxxxie.Year";
        let a = similarity(tie, "Dbmovie.Year");
        let b = similarity(tie, "Dbserie.Year");
        assert_eq!(a, b);
        let result = verify(&format!("{{{{.{}}}}}", tie), SchemaType::Parser);
        assert_eq!(result.suggestions[0], "Did you mean 'Dbmovie.Year'?");
    }

    #[test]
    fn test_verification_is_idempotent() {
        let template = "{{.Dbserie.Seriname}} - {{.Identifier}}";
        assert_eq!(
            verify(template, SchemaType::Parser),
            verify(template, SchemaType::Parser)
        );
    }
}
