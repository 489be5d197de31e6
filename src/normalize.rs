//! Text normalization shared by the resolver and the exporter.

use once_cell::sync::Lazy;
use regex::Regex;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Anything that is not a letter, digit, space, `-` or `_`
static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{Alphabetic}\p{N} _-]").unwrap());

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Normalize free text for title matching: trim and lowercase.
///
/// Blank input gives the empty string. Callers must treat an empty key as
/// "no match" so blank source labels never hit a catalog title.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Turn a book title into a file-name-safe stem.
/// e.g., "Clean Code: A Handbook" → "Clean_Code__A_Handbook"
pub fn sanitize_file_stem(title: &str) -> String {
    UNSAFE_FILE_CHARS
        .replace_all(title, "_")
        .replace(' ', "_")
}

// ============================================================================
// TESTS
// ============================================================================
