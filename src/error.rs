//! Error types for window resolution and catalog access.
//!
//! None of these abort a batch: callers record them per observation or per
//! search strategy and carry on.

use thiserror::Error;

/// A time label that is neither `"Live"` nor a 24-hour `HH:MM` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid time label '{label}' (expected \"Live\" or HH:MM)")]
pub struct TimeLabelError {
    pub label: String,
}

/// Rejected time window definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WindowError {
    /// Absolute windows are same-day only; 22:00-02:00 style ranges are refused.
    #[error("window {start}-{end} wraps past midnight; absolute windows must have start <= end")]
    WrapsMidnight { start: String, end: String },

    #[error("lookback must not be negative (got {minutes} minutes)")]
    NegativeLookback { minutes: i64 },

    #[error(transparent)]
    Label(#[from] TimeLabelError),
}

/// Failures raised by a catalog search capability.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Storage or transport failure inside the catalog backend.
    #[error("catalog backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// Network, auth or rate-limit failures reported by remote clients.
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("invalid catalog query: {0}")]
    InvalidQuery(String),
}
