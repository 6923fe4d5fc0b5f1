// File: ./src/extract.rs
//! Turning parsed events into one interval per source, then one per property.
use crate::model::{Interval, ParsedEvent};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Latest end first, then latest start.
fn dominance(a: &Interval, b: &Interval) -> Ordering {
    a.end.cmp(&b.end).then(a.start.cmp(&b.start))
}

/// Pick the representative booking window for one source.
///
/// Events without both dates, or whose end is not after `now`, are dropped.
/// Only one interval per source survives; other concurrent bookings listed
/// by the same feed are not tracked.
pub fn extract_interval(
    events: &[ParsedEvent],
    source: &str,
    now: DateTime<Utc>,
) -> Option<Interval> {
    events
        .iter()
        .filter_map(|e| match (e.start, e.end) {
            (Some(start), Some(end)) if end > now => Some(Interval {
                start,
                end,
                source: source.to_string(),
                uid: e.uid.clone(),
                summary: e.summary.clone(),
            }),
            _ => None,
        })
        // Ties keep the first event in feed order.
        .reduce(|best, next| {
            if dominance(&next, &best) == Ordering::Greater {
                next
            } else {
                best
            }
        })
}

/// Pick the interval that represents a property this pass.
///
/// `intervals` is expected in the property's source order; on a complete tie
/// the earlier source wins, which keeps the result independent of which
/// fetch finished first.
pub fn select_dominant(intervals: &[Interval]) -> Option<Interval> {
    let mut best: Option<&Interval> = None;
    for candidate in intervals {
        match best {
            Some(current) if dominance(candidate, current) != Ordering::Greater => {}
            _ => best = Some(candidate),
        }
    }
    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 0, 0, 0).unwrap()
    }

    fn event(uid: &str, start: Option<u32>, end: Option<u32>) -> ParsedEvent {
        ParsedEvent {
            uid: Some(uid.to_string()),
            start: start.map(day),
            end: end.map(day),
            summary: None,
        }
    }

    fn iv(source: &str, start: u32, end: u32) -> Interval {
        Interval {
            start: day(start),
            end: day(end),
            source: source.to_string(),
            uid: None,
            summary: None,
        }
    }

    #[test]
    fn picks_latest_end_among_future_events() {
        let now = day(3);
        let events = vec![
            event("past", Some(1), Some(2)),
            event("short", Some(4), Some(6)),
            event("long", Some(5), Some(10)),
            event("no-end", Some(7), None),
            event("no-start", None, Some(20)),
        ];
        let picked = extract_interval(&events, "Airbnb", now).unwrap();
        assert_eq!(picked.uid.as_deref(), Some("long"));
        assert_eq!(picked.source, "Airbnb");
    }

    #[test]
    fn equal_end_prefers_later_start() {
        let events = vec![
            event("early", Some(4), Some(10)),
            event("late", Some(8), Some(10)),
        ];
        let picked = extract_interval(&events, "Vrbo", day(1)).unwrap();
        assert_eq!(picked.uid.as_deref(), Some("late"));
    }

    #[test]
    fn nothing_left_after_filtering() {
        let now = day(15);
        let events = vec![
            event("past", Some(1), Some(2)),
            event("ends-now", Some(10), Some(15)),
        ];
        assert_eq!(extract_interval(&events, "Airbnb", now), None);
        assert_eq!(extract_interval(&[], "Airbnb", now), None);
    }

    #[test]
    fn ongoing_stay_is_kept() {
        let now = day(6) + Duration::hours(12);
        let events = vec![event("current", Some(5), Some(10))];
        assert!(extract_interval(&events, "Airbnb", now).is_some());
    }

    #[test]
    fn dominance_is_order_independent() {
        let a = iv("A", 5, 10);
        let b = iv("B", 8, 12);
        assert_eq!(select_dominant(&[a.clone(), b.clone()]), Some(b.clone()));
        assert_eq!(select_dominant(&[b.clone(), a]), Some(b));
    }

    #[test]
    fn dominance_tie_breaks_on_start_then_source_order() {
        let a = iv("A", 5, 12);
        let b = iv("B", 8, 12);
        assert_eq!(select_dominant(&[a.clone(), b.clone()]).unwrap().source, "B");
        assert_eq!(select_dominant(&[b, a]).unwrap().source, "B");

        let first = iv("First", 8, 12);
        let second = iv("Second", 8, 12);
        assert_eq!(select_dominant(&[first, second]).unwrap().source, "First");
    }

    #[test]
    fn no_intervals_means_no_dominant() {
        assert_eq!(select_dominant(&[]), None);
    }
}
