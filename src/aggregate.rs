//! Play-count ranking over a rolling lookback.

use chrono::{Duration, NaiveDateTime};
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::models::{AggregatedTrack, RawObservation, TrackObservation};
use crate::window::resolve_relative;

/// Default lookback for the top list, in hours.
pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;

/// Default size of the top list.
pub const DEFAULT_TOP_LIMIT: usize = 50;

/// Index mapping exact title to its position in the first-seen ordered groups.
type TitleIndex = FxHashMap<String, usize>;

/// Rank titles by how often they aired within `lookback` before `now`.
///
/// Titles are grouped by exact string (no case folding or trimming), so
/// spelling variants count separately. Ties keep first-seen order.
pub fn top_n(
    observations: &[RawObservation],
    lookback: Duration,
    now: NaiveDateTime,
    limit: usize,
) -> Vec<AggregatedTrack> {
    let selection = resolve_relative(observations, lookback, now);

    let mut index = TitleIndex::default();
    let mut groups: Vec<AggregatedTrack> = Vec::new();

    for observation in selection.tracks {
        match index.get(&observation.title) {
            Some(&idx) => groups[idx].count += 1,
            None => {
                index.insert(observation.title.clone(), groups.len());
                groups.push(AggregatedTrack {
                    title: observation.title.clone(),
                    count: 1,
                    representative: observation,
                });
            }
        }
    }

    debug!(
        unique_titles = groups.len(),
        skipped = selection.skipped.len(),
        "Grouped observations"
    );

    // sort_by is stable: equal counts stay in first-seen order
    groups.sort_by(|a, b| b.count.cmp(&a.count));
    groups.truncate(limit);
    groups
}

/// `top_n` with the default 24 hour lookback and 50 entry limit.
pub fn top_default(observations: &[RawObservation], now: NaiveDateTime) -> Vec<AggregatedTrack> {
    top_n(
        observations,
        Duration::hours(i64::from(DEFAULT_LOOKBACK_HOURS)),
        now,
        DEFAULT_TOP_LIMIT,
    )
}

/// The representative observation of each ranked title, in rank order.
pub fn representatives(ranked: Vec<AggregatedTrack>) -> Vec<TrackObservation> {
    ranked.into_iter().map(|t| t.representative).collect()
}
