// File: ./src/testing.rs
//! In-process doubles for the engine's collaborators, shared by unit and
//! integration tests.
use crate::error::FetchError;
use crate::fetcher::FeedSource;
use crate::trigger::MissionAutomation;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Serves feeds from memory. URLs with no feed answer 404.
#[derive(Debug, Default)]
pub struct StaticFeeds {
    feeds: Mutex<HashMap<String, Result<String, String>>>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl StaticFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, url: &str, ics: impl Into<String>) {
        self.feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), Ok(ics.into()));
    }

    /// Make `url` fail with a transport error until it is `set` again.
    pub fn fail(&self, url: &str, reason: &str) {
        self.feeds
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.to_string(), Err(reason.to_string()));
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .sum()
    }
}

#[async_trait]
impl FeedSource for StaticFeeds {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        *self
            .fetches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(url.to_string())
            .or_default() += 1;

        let feeds = self.feeds.lock().unwrap_or_else(|e| e.into_inner());
        match feeds.get(url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(reason)) => Err(FetchError::Transport(reason.clone())),
            None => Err(FetchError::Status(http::StatusCode::NOT_FOUND)),
        }
    }
}

/// Counts hook invocations.
#[derive(Debug, Default)]
pub struct RecordingAutomation {
    upcoming: AtomicUsize,
    ended: AtomicUsize,
}

impl RecordingAutomation {
    pub fn upcoming_calls(&self) -> usize {
        self.upcoming.load(Ordering::SeqCst)
    }

    pub fn ended_calls(&self) -> usize {
        self.ended.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MissionAutomation for RecordingAutomation {
    async fn process_upcoming_bookings(&self) -> anyhow::Result<()> {
        self.upcoming.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn process_recently_ended_bookings(&self) -> anyhow::Result<()> {
        self.ended.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Build a minimal feed with one VEVENT per `(uid, dtstart, dtend)`, using
/// iCalendar date or date-time values as given.
pub fn ics_feed(events: &[(&str, &str, &str)]) -> String {
    let mut out = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//staysync//test//EN\r\n");
    for (uid, start, end) in events {
        let kind = |v: &str| if v.len() == 8 { ";VALUE=DATE" } else { "" };
        out.push_str("BEGIN:VEVENT\r\n");
        out.push_str(&format!("UID:{}\r\n", uid));
        out.push_str(&format!("DTSTART{}:{}\r\n", kind(start), start));
        out.push_str(&format!("DTEND{}:{}\r\n", kind(end), end));
        out.push_str("SUMMARY:Reserved\r\n");
        out.push_str("END:VEVENT\r\n");
    }
    out.push_str("END:VCALENDAR\r\n");
    out
}
