use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// A half-open wall-clock window `[start, end)` during which usage is
/// not billed, typically a scheduled maintenance outage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl IgnoreWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        if end < start {
            return Err(CoreError::WindowOutOfOrder { start, end });
        }
        Ok(IgnoreWindow { start, end })
    }
}

/// A billable slice of a usage interval after outage subtraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BillableSegment {
    /// Epoch seconds.
    pub start: i64,
    /// Seconds, always positive.
    pub duration: i64,
}

impl BillableSegment {
    pub fn end(&self) -> i64 {
        self.start + self.duration
    }
}

/// Parses ignore windows from a comma-separated list of
/// `start/end` RFC 3339 pairs, e.g.
/// `2023-01-02T03:00:00Z/2023-01-02T06:00:00Z`.
pub fn parse_ignore_windows(raw: &str) -> Result<Vec<IgnoreWindow>, CoreError> {
    let mut windows = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let (start_raw, end_raw) = entry
            .split_once('/')
            .ok_or_else(|| CoreError::MalformedWindow(entry.to_string()))?;
        let start = parse_timestamp(start_raw.trim())?;
        let end = parse_timestamp(end_raw.trim())?;
        windows.push(IgnoreWindow::new(start, end)?);
    }
    Ok(windows)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|source| CoreError::BadWindowTimestamp {
            value: raw.to_string(),
            source,
        })
}

/// Subtracts every ignore window from a usage interval, returning the
/// billable remainder as disjoint segments in chronological order.
///
/// The segments never overlap a window, never extend past the original
/// interval, and carry strictly positive durations. A window covering
/// the whole interval yields an empty vector.
pub fn subtract_ignore_windows(
    start: i64,
    duration: i64,
    windows: &[IgnoreWindow],
) -> Vec<BillableSegment> {
    let mut segments = vec![BillableSegment { start, duration }];
    for window in windows {
        let w_start = window.start.timestamp();
        let w_end = window.end.timestamp();
        let mut next = Vec::with_capacity(segments.len() + 1);
        for segment in segments {
            if w_end <= segment.start || w_start >= segment.end() {
                next.push(segment);
                continue;
            }
            if w_start > segment.start {
                next.push(BillableSegment {
                    start: segment.start,
                    duration: w_start - segment.start,
                });
            }
            if w_end < segment.end() {
                next.push(BillableSegment {
                    start: w_end,
                    duration: segment.end() - w_end,
                });
            }
        }
        segments = next;
    }
    segments.retain(|segment| segment.duration > 0);
    segments
}
