//! Error taxonomy for the parsing, scoring and naming core
//!
//! None of these are fatal to the host process. Each is recovered close to
//! where it happens and folded into a structured result (`rejected`,
//! `errors[]`, `error`) before it reaches a caller over the API.

use serde::Serialize;
use thiserror::Error;

/// A profile or regex-config pattern that could not be compiled.
///
/// Kept next to the pattern's own result so one bad entry never aborts the
/// evaluation of the rest of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("invalid pattern '{pattern}': {message}")]
pub struct PatternCompileError {
    pub pattern: String,
    pub message: String,
}

impl PatternCompileError {
    pub fn new(pattern: impl Into<String>, err: &regex::Error) -> Self {
        Self {
            pattern: pattern.into(),
            message: err.to_string(),
        }
    }
}

/// Failure while executing a template against a context
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("template syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("undefined variable ${0}")]
    UndefinedVariable(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("can't evaluate field {field} in type {found}")]
    FieldOnScalar { field: String, found: &'static str },

    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("wrong number of args for {name}: want {want}, got {got}")]
    Arity {
        name: String,
        want: usize,
        got: usize,
    },
}

impl RenderError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        RenderError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// Errors surfaced by the core components
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error(transparent)]
    PatternCompile(#[from] PatternCompileError),

    #[error("required pattern missing: {0}")]
    RequiredPatternMissing(String),

    #[error("rejected pattern matched: {0}")]
    RejectedPatternMatched(String),

    #[error("could not resolve season/episode or date from '{0}'")]
    UnresolvedIdentifier(String),

    #[error("Unknown field reference: {0}")]
    UnknownFieldReference(String),

    #[error("{0}")]
    UnbalancedTemplateSyntax(String),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl CoreError {
    /// Retrying the same input can never succeed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CoreError::UnresolvedIdentifier(_)
                | CoreError::RequiredPatternMissing(_)
                | CoreError::RejectedPatternMatched(_)
        )
    }
}
