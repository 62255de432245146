//! Progress bar helpers.
//!
//! In log-only mode bars are hidden and progress is reported through
//! periodic log lines instead, which reads better under `tail -f`.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tracing::info;

/// Format duration in human-readable format
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec}, ETA: {eta})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// Create a progress bar with consistent styling. Hidden in log-only mode.
pub fn create_progress_bar(len: u64, msg: &str, log_only: bool) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if log_only {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(bar_style());
    }
    pb.set_message(msg.to_string());
    pb
}

/// Whether a log-only progress line is due at `current`.
pub fn should_log(current: u64, total: u64, interval: u64) -> bool {
    current == total || (interval > 0 && current % interval == 0)
}

/// Log progress at fixed intervals; a no-op unless in log-only mode.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64, log_only: bool) {
    if log_only && total > 0 && should_log(current, total, interval) {
        let pct = 100.0 * current as f64 / total as f64;
        info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}

/// Create a spinner for indeterminate work. Hidden in log-only mode.
pub fn create_spinner(msg: &str, log_only: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if log_only {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg} {spinner} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_should_log() {
        assert!(should_log(100, 250, 100));
        assert!(!should_log(101, 250, 100));
        assert!(should_log(250, 250, 100));
        assert!(!should_log(3, 10, 0));
    }

    #[test]
    fn test_hidden_in_log_only_mode() {
        assert!(create_progress_bar(10, "Matching", true).is_hidden());
        assert!(create_spinner("Indexing", true).is_hidden());
    }
}
