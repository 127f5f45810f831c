//! Global extraction patterns for release names
//!
//! A fixed, ordered catalog of case-insensitive regexes. Each entry has a
//! "value" capture group holding the token the parser cares about; the
//! surrounding `\b`/`_` guards are not part of the value.
//!
//! Quality vocabularies (resolution, source, codec, audio groups) are not
//! here. They belong to each quality profile because they are configurable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::PatternCompileError;

/// Names of the global patterns, in scan order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Season,
    Episode,
    Identifier,
    Date,
    Year,
    Audio,
    Imdb,
    Tvdb,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Season => "season",
            PatternKind::Episode => "episode",
            PatternKind::Identifier => "identifier",
            PatternKind::Date => "date",
            PatternKind::Year => "year",
            PatternKind::Audio => "audio",
            PatternKind::Imdb => "imdb",
            PatternKind::Tvdb => "tvdb",
        }
    }
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One compiled entry of the global catalog
#[derive(Debug)]
pub struct GlobalPattern {
    pub kind: PatternKind,
    pub pattern: &'static str,
    value_group: usize,
    regex: Regex,
}

/// A located value of a global pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternMatch<'h> {
    pub kind: PatternKind,
    pub value: &'h str,
    /// Byte offset of the value inside the haystack
    pub start: usize,
    pub end: usize,
}

impl GlobalPattern {
    fn new(kind: PatternKind, pattern: &'static str, value_group: usize) -> Self {
        // The catalog is a compile-time constant; a failure here is a programming error.
        let regex = Regex::new(pattern).expect("global release pattern must compile");
        Self {
            kind,
            pattern,
            value_group,
            regex,
        }
    }

    /// First match of this pattern in `haystack`
    pub fn find<'h>(&self, haystack: &'h str) -> Option<PatternMatch<'h>> {
        self.find_iter(haystack).next()
    }

    /// All non-overlapping matches, left to right
    pub fn find_iter<'r, 'h>(
        &'r self,
        haystack: &'h str,
    ) -> impl Iterator<Item = PatternMatch<'h>> + use<'r, 'h> {
        self.regex.captures_iter(haystack).filter_map(move |caps| {
            caps.get(self.value_group).map(|m| PatternMatch {
                kind: self.kind,
                value: m.as_str(),
                start: m.start(),
                end: m.end(),
            })
        })
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

static GLOBAL_PATTERNS: Lazy<Vec<GlobalPattern>> = Lazy::new(|| {
    vec![
        GlobalPattern::new(PatternKind::Season, r"(?i)(s?(\d{1,4}))(?: )?[ex]", 2),
        GlobalPattern::new(
            PatternKind::Episode,
            r"(?i)((?:\d{1,4})(?: )?[ex](?: )?(\d{1,3})(?:\b|_|e|$))",
            2,
        ),
        GlobalPattern::new(
            PatternKind::Identifier,
            r"(?i)((s?\d{1,4}(?:(?:(?: )?-?(?: )?[ex-]\d{1,3})+)|\d{2,4}(?:\.|-| |_)\d{1,2}(?:\.|-| |_)\d{1,2}))(?:\b|_)",
            1,
        ),
        GlobalPattern::new(
            PatternKind::Date,
            r"(?i)(?:\b|_)((\d{2,4}(?:\.|-| |_)\d{1,2}(?:\.|-| |_)\d{1,2}))(?:\b|_)",
            1,
        ),
        GlobalPattern::new(PatternKind::Year, r"(?:\b|_)(((?:19\d|20\d)\d))(?:\b|_)", 1),
        GlobalPattern::new(
            PatternKind::Audio,
            r"(?i)(?:\b|_)((dd[0-9\\.]+|dd[p+][0-9\\.]+|dts\W?hd(?:\W?ma)?))(?:\b|_)",
            1,
        ),
        GlobalPattern::new(PatternKind::Imdb, r"(?i)(?:\b|_)((tt[0-9]{4,9}))(?:\b|_)", 1),
        GlobalPattern::new(PatternKind::Tvdb, r"(?i)(?:\b|_)((tvdb[0-9]{2,9}))(?:\b|_)", 1),
    ]
});

/// The global catalog in its fixed scan order
pub fn global_patterns() -> &'static [GlobalPattern] {
    &GLOBAL_PATTERNS
}

pub fn global_pattern(kind: PatternKind) -> &'static GlobalPattern {
    // Every kind has exactly one entry in the catalog.
    GLOBAL_PATTERNS
        .iter()
        .find(|p| p.kind == kind)
        .expect("every pattern kind is registered")
}

/// Compile a user-supplied pattern with forced case-insensitivity.
///
/// `(?i)` is always prepended, even when the pattern carries its own inline flags.
pub fn compile_case_insensitive(pattern: &str) -> Result<Regex, PatternCompileError> {
    Regex::new(&format!("(?i){}", pattern)).map_err(|e| PatternCompileError::new(pattern, &e))
}

/// Case-insensitive search for `needle` as a whole token of `haystack`.
///
/// A token boundary is the start/end of the string or any non-alphanumeric
/// character, so "web-dl" matches in "Show.S01E01.WEB-DL.x264" but "ts" does
/// not match inside "Shorts".
pub fn contains_token(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    let hay = haystack.to_lowercase();
    let needle = needle.to_lowercase();
    let mut from = 0;
    while let Some(pos) = hay[from..].find(&needle) {
        let start = from + pos;
        let end = start + needle.len();
        let before_ok = hay[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric());
        let after_ok = hay[end..].chars().next().is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        // Advance by one character, keeping on a char boundary.
        from = start + hay[start..].chars().next().map_or(1, |c| c.len_utf8());
    }
    false
}
