//! Half-open time intervals
//!
//! The ingestion core compares file spans against event windows in two
//! places: when deciding which files still need work, and when recording
//! which window a file has been ingested for. Both sites use the same
//! predicate, defined here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A half-open time interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// True iff the two half-open intervals share at least one instant.
    ///
    /// Boundary touches do not count: an interval ending exactly where the
    /// other starts does not overlap it.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// True iff `self` fully contains `other` (closed comparison on both
    /// bounds, matching the processed-period coverage rule).
    pub fn covers(&self, other: &TimeRange) -> bool {
        self.start <= other.start && self.end >= other.end
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
