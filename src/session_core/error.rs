//! Error types for the session level engine

use chrono::NaiveDate;
use thiserror::Error;

/// Rejected configuration. Raised at construction time, never clamped.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("retained session count must be at least 1 (got {0})")]
    RetainedSessions(usize),

    #[error("offset table has no entries")]
    EmptyTable,

    #[error("duplicate level name in offset table: {0}")]
    DuplicateLevel(String),

    #[error("level {name} has a non-finite fraction ({fraction})")]
    NonFiniteFraction { name: String, fraction: f64 },
}

/// Errors returned by the engine and its components.
///
/// None of these are fatal for a bar feed: the caller logs them and keeps
/// delivering bars.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Bar violates `high >= low` (NaN included). Running state is untouched.
    #[error("invalid observation at bar {bar_index}: high {high} < low {low}")]
    InvalidObservation {
        bar_index: usize,
        high: f64,
        low: f64,
    },

    /// Only raised with `SessionOrdering::RejectRegression`.
    #[error("trading day {got} is earlier than the tracked session {current}")]
    OutOfOrderSession { current: NaiveDate, got: NaiveDate },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Components were called out of sequence.
    #[error("precondition violated: {0}")]
    Precondition(&'static str),

    #[error("no level {name} in session {trading_day}")]
    UnknownLevel { trading_day: NaiveDate, name: String },
}
