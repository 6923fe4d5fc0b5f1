// File: ./src/model/interval.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A VEVENT as read from a feed. Start and end stay optional here; events
/// missing either one are dropped during extraction, not during parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEvent {
    pub uid: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// The booking window chosen to represent one source, or one property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Label of the calendar source that produced this window.
    pub source: String,
    pub uid: Option<String>,
    pub summary: Option<String>,
}

impl Interval {
    /// Identity used by the reconciler: same window from the same source.
    /// Uid and summary edits alone do not count as a different booking.
    pub fn same_window(&self, other: &Interval) -> bool {
        self.start == other.start && self.end == other.end && self.source == other.source
    }
}

/// `same_window` lifted to optional intervals; two absent intervals are equal.
pub fn same_slot(a: Option<&Interval>, b: Option<&Interval>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => x.same_window(y),
        _ => false,
    }
}
