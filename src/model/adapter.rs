// File: src/model/adapter.rs
use crate::model::ParsedEvent;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use icalendar::{Calendar, CalendarComponent, Component, Event};

/// Converts raw iCalendar text into `ParsedEvent`s.
pub struct IcsAdapter;

impl IcsAdapter {
    /// Parse every VEVENT in a feed. Other component types (VTODO,
    /// VTIMEZONE, ...) are ignored. An event with an unreadable date keeps
    /// `None` for that field instead of failing the whole feed.
    pub fn events_from_ics(raw_ics: &str) -> Result<Vec<ParsedEvent>, String> {
        if !raw_ics.contains("BEGIN:VCALENDAR") {
            return Err("Not an iCalendar document (no VCALENDAR)".to_string());
        }
        let calendar: Calendar = raw_ics.parse().map_err(|e| format!("Parse: {}", e))?;

        let events = calendar
            .components
            .iter()
            .filter_map(|component| match component {
                CalendarComponent::Event(e) => Some(Self::event_from_component(e)),
                _ => None,
            })
            .collect();
        Ok(events)
    }

    fn event_from_component(event: &Event) -> ParsedEvent {
        let text = |v: Option<&str>| {
            v.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        ParsedEvent {
            uid: text(event.get_uid()),
            summary: text(event.get_summary()),
            start: event
                .properties()
                .get("DTSTART")
                .and_then(|p| parse_ical_datetime(p.value())),
            end: event
                .properties()
                .get("DTEND")
                .and_then(|p| parse_ical_datetime(p.value())),
        }
    }
}

/// Reads `DATE` (midnight UTC) and `DATE-TIME` values. Floating and
/// `TZID`-qualified times are taken as UTC.
pub fn parse_ical_datetime(val: &str) -> Option<DateTime<Utc>> {
    let val = val.trim();
    if val.len() == 8 {
        NaiveDate::parse_from_str(val, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|d| d.and_utc())
    } else {
        NaiveDateTime::parse_from_str(
            val,
            if val.ends_with('Z') {
                "%Y%m%dT%H%M%SZ"
            } else {
                "%Y%m%dT%H%M%S"
            },
        )
        .ok()
        .map(|d| Utc.from_utc_datetime(&d))
    }
}
