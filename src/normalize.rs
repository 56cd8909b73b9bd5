//! Author name normalization and slug derivation.
//!
//! Sources disagree on how they spell names: library catalogues use
//! `"Tolstoy, Leo (Count)"`, quotation sites use `"Leo Tolstoy"`. Both
//! normalize to the display form `"Leo Tolstoy"` and the slug `leo-tolstoy`,
//! which is the identity key for unified authors.
//!
//! Everything here is pure: the same input always yields the same output.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Display name used when a record carries no usable name.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Convert a raw author name into its canonical display form.
///
/// `"Last, First (qualifier)"` becomes `"First Last"`. Only the first two
/// comma-separated parts are used and only parenthetical qualifiers are
/// stripped, so `"Ward, Humphry Mrs."` keeps its `Mrs.` verbatim.
pub fn normalize_name(raw: Option<&str>) -> String {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return UNKNOWN_NAME.to_string();
    }

    if !trimmed.contains(',') {
        return trimmed.to_string();
    }

    let mut parts = trimmed.split(',');
    let last = parts.next().unwrap_or_default().trim();
    let first = strip_parentheticals(parts.next().unwrap_or_default());
    let first = first.trim();

    let name = match (first.is_empty(), last.is_empty()) {
        (false, false) => format!("{} {}", first, last),
        (true, false) => last.to_string(),
        (false, true) => first.to_string(),
        (true, true) => String::new(),
    };

    if name.is_empty() {
        UNKNOWN_NAME.to_string()
    } else {
        name
    }
}

/// Derive a URL-safe slug: lower-case ASCII alphanumerics separated by single
/// hyphens, diacritics folded to their base letters.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_hyphen = false;

    for c in s.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Normalize a raw name and derive its slug in one step.
pub fn normalize(raw: Option<&str>) -> (String, String) {
    let name = normalize_name(raw);
    let slug = slugify(&name);
    (name, slug)
}

fn strip_parentheticals(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
