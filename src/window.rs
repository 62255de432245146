//! Time-window resolution for time-of-day labels.
//!
//! Observations only carry a clock time, never a date, so every label is
//! resolved against a single caller-supplied `now`. A relative window may
//! cross midnight: "23:50" seen at 00:30 is yesterday's 23:50.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use tracing::{debug, warn};

use crate::error::WindowError;
use crate::models::{
    check_same_day, AirTime, RawObservation, SkipReason, SkippedObservation, TimeWindow, TrackObservation,
    WindowSelection,
};

/// Resolve an air time to the absolute instant inside `[now - lookback, now]`.
///
/// Two candidates are considered: today at that clock time, and the same
/// clock time yesterday. Today wins when it is not in the future and not
/// before the cutoff; otherwise yesterday is used if it is not before the
/// cutoff. `Live` resolves to `now` itself.
///
/// A negative lookback selects nothing. A lookback reaching past the
/// representable calendar admits every candidate.
pub fn resolve_instant(
    time: AirTime,
    now: NaiveDateTime,
    lookback: Duration,
) -> Option<NaiveDateTime> {
    if lookback < Duration::zero() {
        return None;
    }
    let clock = match time {
        AirTime::Live => now.time(),
        AirTime::At(t) => t,
    };
    let cutoff = now
        .checked_sub_signed(lookback)
        .unwrap_or(NaiveDateTime::MIN);

    let today = now.date().and_time(clock);
    if today <= now && today >= cutoff {
        return Some(today);
    }

    let yesterday = today.checked_sub_signed(Duration::days(1))?;
    if yesterday >= cutoff {
        Some(yesterday)
    } else {
        None
    }
}

fn skip(raw: &RawObservation, reason: SkipReason) -> SkippedObservation {
    warn!(
        title = %raw.title,
        time = %raw.time,
        "Skipping observation: {}",
        reason
    );
    SkippedObservation {
        observation: raw.clone(),
        reason,
    }
}

/// Select observations that aired within `lookback` before `now`.
pub fn resolve_relative(
    observations: &[RawObservation],
    lookback: Duration,
    now: NaiveDateTime,
) -> WindowSelection {
    let mut selection = WindowSelection::default();

    for raw in observations {
        let observation = match TrackObservation::parse(raw) {
            Ok(o) => o,
            Err(e) => {
                selection.skipped.push(skip(raw, SkipReason::MalformedTime(e)));
                continue;
            }
        };

        match resolve_instant(observation.time, now, lookback) {
            Some(aired_at) => {
                debug!(title = %observation.title, %aired_at, "In window");
                selection.tracks.push(observation);
            }
            None => debug!(title = %observation.title, "Outside window"),
        }
    }

    selection
}

/// Select observations whose clock time lies in `[start, end]`.
///
/// Live observations have no fixed clock time and are never included.
/// Ranges that wrap past midnight are rejected rather than guessed at.
pub fn resolve_absolute(
    observations: &[RawObservation],
    start: NaiveTime,
    end: NaiveTime,
) -> Result<WindowSelection, WindowError> {
    check_same_day(start, end)?;

    let mut selection = WindowSelection::default();

    for raw in observations {
        let observation = match TrackObservation::parse(raw) {
            Ok(o) => o,
            Err(e) => {
                selection.skipped.push(skip(raw, SkipReason::MalformedTime(e)));
                continue;
            }
        };

        if let AirTime::At(t) = observation.time {
            if start <= t && t <= end {
                selection.tracks.push(observation);
            }
        }
    }

    Ok(selection)
}

/// Resolve any `TimeWindow`.
pub fn resolve(
    observations: &[RawObservation],
    window: &TimeWindow,
    now: NaiveDateTime,
) -> Result<WindowSelection, WindowError> {
    match *window {
        TimeWindow::Relative { lookback } => {
            if lookback < Duration::zero() {
                return Err(WindowError::NegativeLookback {
                    minutes: lookback.num_minutes(),
                });
            }
            Ok(resolve_relative(observations, lookback, now))
        }
        TimeWindow::Absolute { start, end } => resolve_absolute(observations, start, end),
    }
}

/// Earliest and latest clock time in a batch, with `Live` taken as now.
/// Returns `None` when no observation carries a usable time.
pub fn time_span(
    observations: &[RawObservation],
    now: NaiveDateTime,
) -> Option<(NaiveTime, NaiveTime)> {
    let mut span: Option<(NaiveTime, NaiveTime)> = None;

    for raw in observations {
        let clock = match AirTime::parse(&raw.time) {
            Ok(AirTime::Live) => now.time(),
            Ok(AirTime::At(t)) => t,
            Err(e) => {
                warn!(title = %raw.title, "Skipping observation in span: {}", e);
                continue;
            }
        };
        span = Some(match span {
            None => (clock, clock),
            Some((earliest, latest)) => (earliest.min(clock), latest.max(clock)),
        });
    }

    span
}

/// Separate the currently airing observation from the timed ones.
///
/// The scrape source reports at most one live entry; if more appear, the
/// first is kept as now-playing and the rest are dropped.
pub fn split_live(
    observations: &[TrackObservation],
) -> (Option<TrackObservation>, Vec<TrackObservation>) {
    let mut now_playing = None;
    let mut timed = Vec::with_capacity(observations.len());

    for observation in observations {
        if observation.time.is_live() {
            if now_playing.is_none() {
                now_playing = Some(observation.clone());
            } else {
                warn!(title = %observation.title, "Dropping extra live observation");
            }
        } else {
            timed.push(observation.clone());
        }
    }

    (now_playing, timed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn clock(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn titles(selection: &WindowSelection) -> Vec<&str> {
        selection.tracks.iter().map(|t| t.title.as_str()).collect()
    }

    #[test]
    fn test_midnight_wraparound() {
        let now = at(2024, 5, 2, 0, 30);
        let resolved = resolve_instant(AirTime::At(clock(23, 50)), now, Duration::hours(2));
        assert_eq!(resolved, Some(at(2024, 5, 1, 23, 50)));

        let obs = vec![RawObservation::new("23:50", "Late Song", "1")];
        let selection = resolve_relative(&obs, Duration::hours(2), now);
        assert_eq!(titles(&selection), vec!["Late Song"]);
    }

    #[test]
    fn test_prefers_today_candidate() {
        let now = at(2024, 5, 2, 10, 0);
        // 48h lookback admits both candidates; today is the more recent one
        let resolved = resolve_instant(AirTime::At(clock(9, 0)), now, Duration::hours(48));
        assert_eq!(resolved, Some(at(2024, 5, 2, 9, 0)));
    }

    #[test]
    fn test_instant_always_inside_window() {
        let now = at(2024, 5, 2, 0, 30);
        for hours in 0..30 {
            let lookback = Duration::hours(hours);
            for h in 0..24 {
                for m in [0, 15, 30, 45] {
                    if let Some(instant) = resolve_instant(AirTime::At(clock(h, m)), now, lookback)
                    {
                        assert!(instant <= now);
                        assert!(instant >= now - lookback);
                    }
                }
            }
        }
    }

    #[test]
    fn test_outside_window_excluded() {
        let now = at(2024, 5, 2, 12, 0);
        assert_eq!(
            resolve_instant(AirTime::At(clock(9, 59)), now, Duration::hours(2)),
            None
        );
        // later today means yesterday, which is far outside a 2h window
        assert_eq!(
            resolve_instant(AirTime::At(clock(13, 0)), now, Duration::hours(2)),
            None
        );
        // window bounds are inclusive
        assert_eq!(
            resolve_instant(AirTime::At(clock(10, 0)), now, Duration::hours(2)),
            Some(at(2024, 5, 2, 10, 0))
        );
    }

    #[test]
    fn test_huge_lookback_admits_everything() {
        let now = at(2024, 5, 2, 12, 0);
        let lookback = Duration::hours(i64::from(u32::MAX));
        assert_eq!(
            resolve_instant(AirTime::At(clock(11, 0)), now, lookback),
            Some(at(2024, 5, 2, 11, 0))
        );
        assert_eq!(
            resolve_instant(AirTime::At(clock(13, 0)), now, lookback),
            Some(at(2024, 5, 1, 13, 0))
        );

        let obs = vec![
            RawObservation::new("11:00", "A", "1"),
            RawObservation::new("Live", "B", "2"),
        ];
        let selection = resolve_relative(&obs, lookback, now);
        assert_eq!(titles(&selection), vec!["A", "B"]);
    }

    #[test]
    fn test_negative_lookback_selects_nothing() {
        let now = at(2024, 5, 2, 12, 0);
        assert_eq!(resolve_instant(AirTime::Live, now, Duration::hours(-1)), None);
        let obs = vec![RawObservation::new("11:59", "A", "1")];
        assert!(resolve_relative(&obs, Duration::hours(-1), now).tracks.is_empty());
    }

    #[test]
    fn test_live_always_in_relative_window() {
        let now = at(2024, 5, 2, 7, 10);
        assert_eq!(resolve_instant(AirTime::Live, now, Duration::zero()), Some(now));
        assert_eq!(
            resolve_instant(AirTime::Live, now, Duration::hours(3)),
            Some(now)
        );
    }

    #[test]
    fn test_relative_scenario_all_included() {
        let now = at(2024, 5, 2, 7, 10);
        let obs = vec![
            RawObservation::new("07:00", "Song A", "a"),
            RawObservation::new("07:05", "Song B", "b"),
            RawObservation::new("Live", "Song C", "c"),
        ];
        let selection = resolve_relative(&obs, Duration::hours(1), now);
        assert_eq!(titles(&selection), vec!["Song A", "Song B", "Song C"]);
        assert!(selection.skipped.is_empty());
    }

    #[test]
    fn test_malformed_time_skipped_not_fatal() {
        let now = at(2024, 5, 2, 7, 10);
        let obs = vec![
            RawObservation::new("7 o'clock", "Broken", "x"),
            RawObservation::new("07:00", "Song A", "a"),
        ];
        let selection = resolve_relative(&obs, Duration::hours(1), now);
        assert_eq!(titles(&selection), vec!["Song A"]);
        assert_eq!(selection.skipped.len(), 1);
        assert_eq!(selection.skipped[0].observation.title, "Broken");
        assert!(matches!(
            selection.skipped[0].reason,
            SkipReason::MalformedTime(_)
        ));
    }

    #[test]
    fn test_absolute_window() {
        let obs = vec![
            RawObservation::new("05:59", "Too Early", "1"),
            RawObservation::new("06:00", "Start", "2"),
            RawObservation::new("08:30", "Middle", "3"),
            RawObservation::new("10:00", "End", "4"),
            RawObservation::new("10:01", "Too Late", "5"),
            RawObservation::new("Live", "Now", "6"),
            RawObservation::new("??", "Broken", "7"),
        ];
        let selection = resolve_absolute(&obs, clock(6, 0), clock(10, 0)).unwrap();
        assert_eq!(titles(&selection), vec!["Start", "Middle", "End"]);
        assert_eq!(selection.skipped.len(), 1);
    }

    #[test]
    fn test_absolute_excludes_live() {
        let obs = vec![RawObservation::new("Live", "Now", "1")];
        let selection = resolve_absolute(&obs, clock(0, 0), clock(23, 59)).unwrap();
        assert!(selection.tracks.is_empty());
    }

    #[test]
    fn test_absolute_rejects_overnight_range() {
        let obs = vec![RawObservation::new("23:00", "Late", "1")];
        let err = resolve_absolute(&obs, clock(22, 0), clock(2, 0)).unwrap_err();
        assert!(matches!(err, WindowError::WrapsMidnight { .. }));
    }

    #[test]
    fn test_resolve_presets() {
        let now = at(2024, 5, 2, 20, 0);
        let obs = vec![
            RawObservation::new("07:15", "Morning", "1"),
            RawObservation::new("17:45", "Evening", "2"),
        ];
        let morning = resolve(&obs, &TimeWindow::morning(), now).unwrap();
        assert_eq!(titles(&morning), vec!["Morning"]);
        let evening = resolve(&obs, &TimeWindow::evening(), now).unwrap();
        assert_eq!(titles(&evening), vec!["Evening"]);
    }

    #[test]
    fn test_resolve_rejects_negative_lookback() {
        let now = at(2024, 5, 2, 20, 0);
        let window = TimeWindow::Relative {
            lookback: Duration::hours(-1),
        };
        assert!(resolve(&[], &window, now).is_err());
    }

    #[test]
    fn test_time_span() {
        let now = at(2024, 5, 2, 11, 30);
        let obs = vec![
            RawObservation::new("09:10", "B", "2"),
            RawObservation::new("Live", "C", "3"),
            RawObservation::new("bad", "D", "4"),
            RawObservation::new("08:05", "A", "1"),
        ];
        assert_eq!(time_span(&obs, now), Some((clock(8, 5), clock(11, 30))));
        assert_eq!(time_span(&[], now), None);
    }

    #[test]
    fn test_split_live() {
        let obs: Vec<TrackObservation> = [
            RawObservation::new("Live", "Now", "1"),
            RawObservation::new("07:00", "Earlier", "2"),
            RawObservation::new("Live", "Duplicate", "3"),
        ]
        .iter()
        .map(|r| TrackObservation::parse(r).unwrap())
        .collect();
        let (live, timed) = split_live(&obs);
        assert_eq!(live.map(|t| t.title), Some("Now".to_string()));
        assert_eq!(timed.len(), 1);
        assert_eq!(timed[0].title, "Earlier");
    }
}
