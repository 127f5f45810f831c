//! Naming templates
//!
//! - `schema`: field catalogs of the parser and notification contexts
//! - `verifier`: static checks of template text against a catalog
//! - `template` / `renderer`: parsing and executing the template language
//! - `context`: the structs templates are rendered against
//!
//! A naming configuration holds a folder template and a file template.
//! Rendered output is made filesystem-safe segment by segment.

pub mod context;
pub mod renderer;
pub mod schema;
pub mod template;
pub mod verifier;

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::services::text_utils::collapse_whitespace;

pub use renderer::render;
pub use schema::SchemaType;
pub use template::Template;
pub use verifier::{VerificationResult, verify};

/// Bracket pairs left empty by optional fields, e.g. "Heat ()"
static EMPTY_BRACKETS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(\s*\)|\[\s*\]|\{\s*\}").expect("empty brackets regex must compile")
});

/// Folder and file templates of one naming configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingTemplate {
    pub folder: String,
    pub file: String,
}

impl NamingTemplate {
    pub fn new(folder: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            file: file.into(),
        }
    }

    /// Split a combined `folder/file` template at its last `/`.
    ///
    /// Slashes inside `{{...}}` actions (string literals) do not count.
    pub fn split(combined: &str) -> Self {
        let mut depth = 0usize;
        let mut split_at = None;
        let bytes = combined.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if combined[i..].starts_with("{{") {
                depth += 1;
                i += 2;
                continue;
            }
            if combined[i..].starts_with("}}") {
                depth = depth.saturating_sub(1);
                i += 2;
                continue;
            }
            if bytes[i] == b'/' && depth == 0 {
                split_at = Some(i);
            }
            i += 1;
        }
        match split_at {
            Some(idx) => Self::new(&combined[..idx], &combined[idx + 1..]),
            None => Self::new("", combined),
        }
    }

    /// Parse both templates without rendering
    pub fn parse(&self) -> Result<(Template, Template), RenderError> {
        Ok((Template::parse(&self.folder)?, Template::parse(&self.file)?))
    }
}

/// Filesystem-safe output of a [NamingTemplate]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderedName {
    /// Relative folder, `/`-separated; empty when the folder template is
    pub folder: String,
    /// File name without extension
    pub file: String,
}

impl RenderedName {
    /// Folder joined with the file name and `extension` (with or without dot)
    pub fn relative_path(&self, extension: &str) -> PathBuf {
        let mut path: PathBuf = self.folder.split('/').filter(|s| !s.is_empty()).collect();
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            path.push(&self.file);
        } else {
            path.push(format!("{}.{}", self.file, extension));
        }
        path
    }
}

/// Sanitize one path segment and tidy what empty optional fields left behind
pub fn clean_segment(segment: &str) -> String {
    let sanitized = sanitize_filename::sanitize(segment);
    let without_brackets = EMPTY_BRACKETS_RE.replace_all(&sanitized, "");
    collapse_whitespace(&without_brackets)
        .trim_matches(|c: char| c == '.' || c == '-' || c.is_whitespace())
        .to_string()
}

/// Field values never introduce directories
fn strip_separators(value: &str) -> String {
    value.replace(['/', '\\'], "")
}

/// Render folder and file templates against `context`.
///
/// Only `/` written in the folder template itself separates directories.
pub fn render_name(
    naming: &NamingTemplate,
    context: &impl Serialize,
) -> Result<RenderedName, RenderError> {
    let context = serde_json::to_value(context)
        .map_err(|e| RenderError::TypeMismatch(format!("context is not serializable: {}", e)))?;

    let folder = Template::parse(&naming.folder)?
        .execute_escaped(&context, strip_separators)?
        .split('/')
        .map(clean_segment)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    let file = clean_segment(
        &Template::parse(&naming.file)?.execute_escaped(&context, strip_separators)?,
    );

    Ok(RenderedName { folder, file })
}
