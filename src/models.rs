//! Core data models for the airplay pipeline.
//!
//! Observations flow downstream through these types: raw scrape rows are
//! validated into `TrackObservation`, windowed, optionally ranked into
//! `AggregatedTrack`s, turned into `SearchQuery`s and finally resolved to a
//! `MatchResult` against a catalog.

use std::fmt;

use chrono::{Duration, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{TimeLabelError, WindowError};

// ============================================================================
// Observations
// ============================================================================

/// Sentinel label the station uses for the track airing right now.
pub const LIVE_LABEL: &str = "Live";

/// Observation exactly as supplied by the scrape source.
///
/// The aliases accept the column names of the station export
/// (`Time`, `Track Title`, `Track ID`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObservation {
    #[serde(alias = "Time")]
    pub time: String,
    #[serde(alias = "Track Title")]
    pub title: String,
    #[serde(alias = "Track ID", default)]
    pub station_track_id: String,
}

impl RawObservation {
    pub fn new(time: &str, title: &str, station_track_id: &str) -> Self {
        Self {
            time: time.to_string(),
            title: title.to_string(),
            station_track_id: station_track_id.to_string(),
        }
    }
}

/// When an observation aired: the live sentinel or a time of day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AirTime {
    Live,
    At(NaiveTime),
}

impl AirTime {
    /// Parse `"Live"` or a 24-hour `HH:MM` label.
    pub fn parse(label: &str) -> Result<Self, TimeLabelError> {
        if label == LIVE_LABEL {
            return Ok(AirTime::Live);
        }
        parse_clock(label).map(AirTime::At)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, AirTime::Live)
    }
}

impl fmt::Display for AirTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirTime::Live => f.write_str(LIVE_LABEL),
            AirTime::At(t) => write!(f, "{}", t.format("%H:%M")),
        }
    }
}

impl From<AirTime> for String {
    fn from(value: AirTime) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for AirTime {
    type Error = TimeLabelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AirTime::parse(&value)
    }
}

/// Parse a 24-hour `HH:MM` clock label.
pub fn parse_clock(label: &str) -> Result<NaiveTime, TimeLabelError> {
    NaiveTime::parse_from_str(label, "%H:%M").map_err(|_| TimeLabelError {
        label: label.to_string(),
    })
}

/// A validated radio-track observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackObservation {
    pub time: AirTime,
    pub title: String,
    pub station_track_id: String,
}

impl TrackObservation {
    /// Validate the time label of a raw row.
    pub fn parse(raw: &RawObservation) -> Result<Self, TimeLabelError> {
        Ok(Self {
            time: AirTime::parse(&raw.time)?,
            title: raw.title.clone(),
            station_track_id: raw.station_track_id.clone(),
        })
    }
}

/// Why a raw observation was left out of a window selection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    MalformedTime(TimeLabelError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MalformedTime(e) => write!(f, "{}", e),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedObservation {
    pub observation: RawObservation,
    pub reason: SkipReason,
}

/// Result of window resolution: the included observations, in input order,
/// plus every row that could not be evaluated.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WindowSelection {
    pub tracks: Vec<TrackObservation>,
    pub skipped: Vec<SkippedObservation>,
}

// ============================================================================
// Time Windows
// ============================================================================

fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// Absolute windows are same-day only: `start` must not be after `end`.
pub fn check_same_day(start: NaiveTime, end: NaiveTime) -> Result<(), WindowError> {
    if start > end {
        return Err(WindowError::WrapsMidnight {
            start: start.format("%H:%M").to_string(),
            end: end.format("%H:%M").to_string(),
        });
    }
    Ok(())
}

/// A time-of-day window, resolved against a caller-supplied "now".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeWindow {
    /// Everything that aired within `lookback` before now.
    Relative { lookback: Duration },
    /// Same-day clock range, inclusive on both ends.
    Absolute { start: NaiveTime, end: NaiveTime },
}

impl TimeWindow {
    pub fn last_hours(hours: u32) -> Self {
        TimeWindow::Relative {
            lookback: Duration::hours(i64::from(hours)),
        }
    }

    pub fn lookback(lookback: Duration) -> Result<Self, WindowError> {
        if lookback < Duration::zero() {
            return Err(WindowError::NegativeLookback {
                minutes: lookback.num_minutes(),
            });
        }
        Ok(TimeWindow::Relative { lookback })
    }

    /// Absolute window; ranges that would wrap past midnight are rejected.
    pub fn between(start: NaiveTime, end: NaiveTime) -> Result<Self, WindowError> {
        check_same_day(start, end)?;
        Ok(TimeWindow::Absolute { start, end })
    }

    pub fn parse_between(start: &str, end: &str) -> Result<Self, WindowError> {
        Self::between(parse_clock(start)?, parse_clock(end)?)
    }

    /// Morning drive, 06:00-10:00.
    pub fn morning() -> Self {
        TimeWindow::Absolute {
            start: clock(6, 0),
            end: clock(10, 0),
        }
    }

    /// Evening drive, 16:00-19:00.
    pub fn evening() -> Self {
        TimeWindow::Absolute {
            start: clock(16, 0),
            end: clock(19, 0),
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Play count for one exact title string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AggregatedTrack {
    pub title: String,
    pub count: usize,
    /// First observation seen for this title.
    pub representative: TrackObservation,
}

// ============================================================================
// Queries and Catalog
// ============================================================================

/// Search input derived from one observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchQuery {
    pub title: String,
    /// Primary artist, with any featured artist appended after a comma.
    pub artist: String,
    pub featured_artists: Vec<String>,
    pub station_track_id: String,
}

impl SearchQuery {
    /// The most specific catalog query for this input.
    pub fn to_catalog_query(&self) -> CatalogQuery {
        CatalogQuery::TitleAndArtist {
            title: self.title.clone(),
            artist: self.artist.clone(),
        }
    }
}

/// Which of the ordered search strategies produced a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    TitleAndArtist,
    TitleOnly,
    ArtistOnly,
}

impl SearchStrategy {
    /// Strategies in the order they are attempted.
    pub const ORDER: [SearchStrategy; 3] = [
        SearchStrategy::TitleAndArtist,
        SearchStrategy::TitleOnly,
        SearchStrategy::ArtistOnly,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SearchStrategy::TitleAndArtist => "title+artist",
            SearchStrategy::TitleOnly => "title",
            SearchStrategy::ArtistOnly => "artist",
        }
    }
}

/// Field-scoped catalog query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogQuery {
    TitleAndArtist { title: String, artist: String },
    Title(String),
    Artist(String),
}

impl fmt::Display for CatalogQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogQuery::TitleAndArtist { title, artist } => {
                write!(f, "title:{} artist:{}", title, artist)
            }
            CatalogQuery::Title(title) => write!(f, "title:{}", title),
            CatalogQuery::Artist(artist) => write!(f, "artist:{}", artist),
        }
    }
}

/// Track returned by a catalog search. Never constructed by the matcher.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCandidate {
    pub id: String,
    pub title: String,
    /// Credited artists, in the catalog's order.
    pub artists: Vec<String>,
}

// ============================================================================
// Match Results
// ============================================================================

/// What happened when one strategy was tried.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    SearchFailed { error: String },
    NoCandidates,
    BelowThreshold { best_score: f64 },
    Accepted { score: f64 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: SearchStrategy,
    pub query: String,
    pub outcome: AttemptOutcome,
}

/// Outcome of resolving one title/artist pair.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub candidate: Option<CatalogCandidate>,
    /// Combined confidence, 0-100. Always 0 when `candidate` is `None`.
    pub score: f64,
    pub strategy: Option<SearchStrategy>,
    pub attempts: Vec<StrategyAttempt>,
}

impl MatchResult {
    pub fn unmatched(attempts: Vec<StrategyAttempt>) -> Self {
        Self {
            candidate: None,
            score: 0.0,
            strategy: None,
            attempts,
        }
    }

    pub fn is_match(&self) -> bool {
        self.candidate.is_some()
    }

    /// True when at least one strategy failed at the catalog rather than
    /// simply finding nothing acceptable.
    pub fn had_search_failure(&self) -> bool {
        self.attempts
            .iter()
            .any(|a| matches!(a.outcome, AttemptOutcome::SearchFailed { .. }))
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Batch matching counters.
#[derive(Default, Debug, Clone, Serialize)]
pub struct MatchingStats {
    pub total_queries: usize,
    pub total_matches: usize,
    pub total_unmatched: usize,

    pub title_artist_matches: usize,
    pub title_only_matches: usize,
    pub artist_only_matches: usize,

    pub search_failures: usize,
    pub items_with_search_failures: usize,
}

impl MatchingStats {
    /// Calculate match rate as a percentage
    pub fn match_rate(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            100.0 * self.total_matches as f64 / self.total_queries as f64
        }
    }

    pub fn record(&mut self, result: &MatchResult) {
        self.total_queries += 1;
        let failures = result
            .attempts
            .iter()
            .filter(|a| matches!(a.outcome, AttemptOutcome::SearchFailed { .. }))
            .count();
        self.search_failures += failures;
        if failures > 0 {
            self.items_with_search_failures += 1;
        }

        match result.strategy {
            Some(SearchStrategy::TitleAndArtist) => self.title_artist_matches += 1,
            Some(SearchStrategy::TitleOnly) => self.title_only_matches += 1,
            Some(SearchStrategy::ArtistOnly) => self.artist_only_matches += 1,
            None => {}
        }
        if result.is_match() {
            self.total_matches += 1;
        } else {
            self.total_unmatched += 1;
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
