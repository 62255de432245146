//! Search query construction from noisy station titles.
//!
//! Station titles often embed the artist ("Artist - Song"), carry tags like
//! "(Lyrics)" and trail off into numeric version codes. There is usually no
//! separate artist field, so one is derived from the title itself.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{SearchQuery, TrackObservation};
use crate::normalize::{collapse_whitespace, sanitize_artist};

/// Artist used when nothing usable can be derived.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Title noise: any "(...)" segment, or a trailing run starting at a digit
/// sequence (station remix/version codes like "2024", "3 Edit").
pub static TITLE_NOISE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\([^)]*\)|\b\d+.*$").unwrap());

/// Separators between an embedded artist and the rest of the title:
/// dashes, "feat"/"ft", ampersand, slash.
pub static ARTIST_TITLE_SEPARATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+[-–—]+\s+|\s+feat\b|\s+ft\b|\s+&\s+|/").unwrap()
});

/// Parenthesized featured artist: "(feat. Nviiri)", "(Feat Someone)"
pub static FEATURED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\(feat[.\s]*([^)]+)\)").unwrap());

// ============================================================================
// QUERY BUILDING
// ============================================================================

/// Strip parenthesized segments and trailing numeric codes, collapse spaces.
/// e.g., "Good Days (Lyrics) 2024" → "Good Days"
pub fn clean_title(title: &str) -> String {
    collapse_whitespace(&TITLE_NOISE.replace_all(title, ""))
}

/// Best-effort artist from a cleaned title: the text before the first
/// separator, restricted to name characters.
pub fn derive_artist(cleaned_title: &str) -> String {
    let first = ARTIST_TITLE_SEPARATOR
        .split(cleaned_title)
        .next()
        .unwrap_or("")
        .trim();
    let artist = sanitize_artist(first);
    if artist.is_empty() {
        UNKNOWN_ARTIST.to_string()
    } else {
        artist
    }
}

/// Featured artist from a "(feat. Name)" segment of the original title.
pub fn extract_featured(original_title: &str) -> Option<String> {
    let caps = FEATURED.captures(original_title)?;
    let featured = sanitize_artist(caps.get(1)?.as_str().trim());
    if featured.is_empty() {
        None
    } else {
        Some(featured)
    }
}

/// Build a search query from a raw title and an optional artist field.
pub fn build_query(title: &str, artist: Option<&str>) -> SearchQuery {
    let cleaned = clean_title(title);

    let mut artist = match artist.map(str::trim) {
        Some(a) if !a.is_empty() => a.to_string(),
        _ => derive_artist(&cleaned),
    };

    let mut featured_artists = Vec::new();
    if let Some(featured) = extract_featured(title) {
        artist = format!("{}, {}", artist, featured);
        featured_artists.push(featured);
    }

    SearchQuery {
        title: cleaned,
        artist: collapse_whitespace(&artist),
        featured_artists,
        station_track_id: String::new(),
    }
}

/// Query for a windowed observation; the station id is carried along.
pub fn build_query_for(observation: &TrackObservation) -> SearchQuery {
    SearchQuery {
        station_track_id: observation.station_track_id.clone(),
        ..build_query(&observation.title, None)
    }
}

pub fn build_queries(observations: &[TrackObservation]) -> Vec<SearchQuery> {
    observations.iter().map(build_query_for).collect()
}
