//! Shared text normalization for query building and match scoring.
//!
//! CRITICAL: the scorer compares strings produced here on both sides (search
//! input and catalog candidates). Any change shifts every similarity score.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Parenthesized or bracketed segments: "(Lyrics)", "[Official Video]"
pub static PARENTHETICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(.*?\)|\[.*?\]").unwrap());

/// Words that carry no identity for a track title.
pub static STOP_WORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:the|a|an|remix|remaster|live)\b").unwrap());

/// Anything that cannot appear in an artist name derived from free text.
pub static NON_ARTIST_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\s'\-&]").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0x20D0..=0x20FF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to lowercase ASCII: NFKD decomposition, combining marks
/// dropped, remaining non-ASCII transliterated.
/// e.g., "Beyoncé" → "beyonce", "Sigur Rós" → "sigur ros"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    any_ascii(&stripped).to_lowercase()
}

/// Collapse runs of whitespace to single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert curly quotes and stray accents to straight apostrophes/quotes.
pub fn normalize_punctuation(s: &str) -> String {
    s.replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{00B4}', '\u{0060}'], "'")
}

// ============================================================================
// NORMALIZATION FUNCTIONS
// ============================================================================

/// Diacritics stripped, lowercased, whitespace collapsed.
pub fn normalize_text(s: &str) -> String {
    collapse_whitespace(&fold_to_ascii(&normalize_punctuation(s)))
}

/// Reduce a title to its identifying words: bracketed segments and stop
/// words removed, then normalized.
pub fn canonical_title(title: &str) -> String {
    let without_brackets = PARENTHETICAL.replace_all(title, "");
    let without_stop_words = STOP_WORDS.replace_all(&without_brackets, "");
    normalize_text(&without_stop_words)
}

/// Keep letters, spaces, apostrophes, hyphens and ampersands; collapse
/// whitespace. Case and diacritics are preserved.
pub fn sanitize_artist(s: &str) -> String {
    collapse_whitespace(&NON_ARTIST_CHARS.replace_all(s, ""))
}

// ============================================================================
// TESTS
// ============================================================================
