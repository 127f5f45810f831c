//! Shared text comparison and cleanup utilities
//!
//! Used by the template verifier for "did you mean" suggestions and by the
//! name renderer to tidy output left behind by empty optional fields.

/// Score how close two field paths are, from 0 to 100.
///
/// Case-insensitive. Equal strings score 100, a substring of the other scores
/// 80, otherwise the share of `a`'s characters that occur anywhere in `b`,
/// scaled to the longer length.
///
/// # Example
/// ```ignore
/// assert_eq!(similarity("Dbmovie.Title", "dbmovie.title"), 100);
/// assert_eq!(similarity("Dbmovie.Titl", "Dbmovie.Title"), 80);
/// ```
pub fn similarity(a: &str, b: &str) -> u32 {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    if a == b {
        return 100;
    }
    if a.contains(&b) || b.contains(&a) {
        return 80;
    }

    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0;
    }
    let matches = a.chars().filter(|c| b.contains(*c)).count();
    (matches * 100 / max_len) as u32
}

/// Collapse whitespace runs into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
