// File: ./src/debounce.rs
//! Remembers when each (property, source) pair was last fetched successfully.
use crate::model::Interval;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceEntry {
    pub fetched_at: DateTime<Utc>,
    /// What that fetch extracted; re-used while the entry is fresh.
    pub interval: Option<Interval>,
}

#[derive(Debug)]
pub struct DebounceLedger {
    window: Duration,
    entries: Mutex<HashMap<(String, String), DebounceEntry>>,
}

impl DebounceLedger {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the last successful fetch for this pair when it is younger
    /// than the debounce window, meaning the fetch should be skipped.
    pub fn lookup(&self, property: &str, source: &str, now: DateTime<Utc>) -> Option<DebounceEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&(property.to_string(), source.to_string()))
            .filter(|entry| now - entry.fetched_at < self.window)
            .cloned()
    }

    pub fn record(
        &self,
        property: &str,
        source: &str,
        fetched_at: DateTime<Utc>,
        interval: Option<Interval>,
    ) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            (property.to_string(), source.to_string()),
            DebounceEntry {
                fetched_at,
                interval,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
