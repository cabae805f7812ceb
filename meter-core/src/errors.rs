use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error types for the billing engine
#[derive(Error, Debug)]
pub enum CoreError {
    /// Duration math assumes one sampling step for the whole run, so
    /// batches collected with different steps can never be merged.
    #[error("batches disagree on the sampling step: expected {expected} minutes, got {found} minutes")]
    IntervalMismatch { expected: u32, found: u32 },

    /// An ignore window whose end precedes its start.
    #[error("ignore window ends at {end} before it starts at {start}")]
    WindowOutOfOrder { start: DateTime<Utc>, end: DateTime<Utc> },

    /// An ignore window that does not parse as `start/end`.
    #[error("malformed ignore window {0:?}: expected <start>/<end> as RFC 3339 timestamps")]
    MalformedWindow(String),

    /// A timestamp inside an ignore window that is not RFC 3339.
    #[error("invalid timestamp {value:?} in ignore window: {source}")]
    BadWindowTimestamp {
        value: String,
        source: chrono::ParseError,
    },

    /// A service unit present in the catalog but missing from the rates
    /// table. Billing must not proceed with a silently zeroed price.
    #[error("no rate configured for service unit type {0:?}")]
    MissingRate(String),

    /// A catalog profile that would divide by zero during classification.
    #[error("service unit {0:?} has a non-positive vCPU or RAM quantity")]
    DegenerateProfile(String),
}
