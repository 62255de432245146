//! Scoring functions for catalog matching.
//!
//! This module contains:
//! - String similarity on a 0-100 scale
//! - Artist scoring against every credited catalog artist
//! - Title scoring
//! - Combined weighted score and single-winner selection

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::CatalogCandidate;
use crate::normalize::{canonical_title, normalize_text};

// ============================================================================
// Score Thresholds
// ============================================================================

/// A match must score strictly above this (0-100 scale).
pub const ACCEPT_THRESHOLD: f64 = 70.0;

pub const ARTIST_WEIGHT: f64 = 0.6;
pub const TITLE_WEIGHT: f64 = 0.4;

// ============================================================================
// Regex Patterns
// ============================================================================

/// Separators inside a search artist string: "&", ",", any "x", "feat.", "ft."
///
/// "x" splits anywhere, including inside names ("Alexander"), and the
/// feat/ft forms need their trailing dot.
pub static POTENTIAL_ARTIST_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[&,x]|\bft\.|\bfeat\.").unwrap());

// ============================================================================
// Similarity
// ============================================================================

/// Indel similarity, `2 * LCS / (|a| + |b|)`, on a 0-100 scale rounded
/// to a whole number. Empty input on either side scores 0.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    (rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0).round()
}

// ============================================================================
// Artist / Title Scores
// ============================================================================

/// Split a search artist string into normalized individual names.
/// e.g., "Sauti Sol, Nviiri" → ["sauti sol", "nviiri"]
pub fn split_potential_artists(artist: &str) -> Vec<String> {
    POTENTIAL_ARTIST_SEPARATOR
        .split(artist)
        .map(normalize_text)
        .filter(|a| !a.is_empty())
        .collect()
}

/// Best similarity between any potential artist and any credited artist.
pub fn artist_score(potential_artists: &[String], candidate: &CatalogCandidate) -> f64 {
    let mut best: f64 = 0.0;
    for credited in &candidate.artists {
        let credited = normalize_text(credited);
        for potential in potential_artists {
            best = best.max(similarity(potential, &credited));
        }
    }
    best
}

/// Similarity of the candidate title to the search artist string, both
/// canonicalized. The title is compared against the artist
/// input, not the search title.
pub fn title_score(candidate: &CatalogCandidate, search_artist: &str) -> f64 {
    similarity(
        &canonical_title(&candidate.title),
        &canonical_title(search_artist),
    )
}

// ============================================================================
// Combined Scoring
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub artist: f64,
    pub title: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            artist: ARTIST_WEIGHT,
            title: TITLE_WEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateScore {
    pub artist: f64,
    pub title: f64,
    pub combined: f64,
}

pub fn combined_score(
    candidate: &CatalogCandidate,
    potential_artists: &[String],
    search_artist: &str,
    weights: ScoreWeights,
) -> CandidateScore {
    let artist = artist_score(potential_artists, candidate);
    let title = title_score(candidate, search_artist);
    CandidateScore {
        artist,
        title,
        combined: weights.artist * artist + weights.title * title,
    }
}

/// Score every candidate against one search artist, in candidate order.
pub fn score_candidates(
    candidates: &[CatalogCandidate],
    search_artist: &str,
    weights: ScoreWeights,
) -> Vec<CandidateScore> {
    let potential_artists = split_potential_artists(search_artist);
    candidates
        .iter()
        .map(|c| combined_score(c, &potential_artists, search_artist, weights))
        .collect()
}

/// Max-reduction over scored candidates: the first candidate with the
/// highest strictly positive score wins.
pub fn best_candidate<'a, I>(scored: I) -> Option<(&'a CatalogCandidate, f64)>
where
    I: IntoIterator<Item = (&'a CatalogCandidate, f64)>,
{
    let mut best: Option<(&'a CatalogCandidate, f64)> = None;
    let mut best_score = 0.0;
    for (candidate, score) in scored {
        if score > best_score {
            best_score = score;
            best = Some((candidate, score));
        }
    }
    best
}

/// Strict acceptance: a score equal to the threshold is rejected.
pub fn is_accepted(score: f64, threshold: f64) -> bool {
    score > threshold
}

// ============================================================================
// Tests
// ============================================================================
