// File: ./src/model/booking.rs
use crate::model::Interval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_GUEST_LABEL: &str = "Reserved";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Confirmed,
}

/// At most one booking exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingKey {
    pub property: String,
    pub external_id: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub property: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub guest_label: String,
    pub source: String,
    pub external_id: String,
    pub status: BookingStatus,
    pub synced_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    /// Set on insert, never touched by later upserts.
    pub created_at: DateTime<Utc>,
}

impl Booking {
    pub fn key(&self) -> BookingKey {
        BookingKey {
            property: self.property.clone(),
            external_id: self.external_id.clone(),
            source: self.source.clone(),
        }
    }
}

/// Id used when a feed event carries no UID.
pub fn synthetic_external_id(property: &str, start: DateTime<Utc>) -> String {
    format!("{}-{}", property, start.timestamp())
}

/// One idempotent write keyed by `(property, external_id, source)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingUpsert {
    pub key: BookingKey,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub guest_label: String,
    pub synced_at: DateTime<Utc>,
}

/// What applying an upsert did to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertEffect {
    Inserted,
    Modified,
    Unchanged,
}

impl BookingUpsert {
    pub fn from_interval(property: &str, interval: &Interval, now: DateTime<Utc>) -> Self {
        let external_id = interval
            .uid
            .as_deref()
            .map(str::trim)
            .filter(|uid| !uid.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| synthetic_external_id(property, interval.start));

        let guest_label = interval
            .summary
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_GUEST_LABEL)
            .to_string();

        Self {
            key: BookingKey {
                property: property.to_string(),
                external_id,
                source: interval.source.clone(),
            },
            start_date: interval.start,
            end_date: interval.end,
            guest_label,
            synced_at: now,
        }
    }

    /// Apply this write on top of the currently stored row, if any.
    ///
    /// `synced_at` always moves forward; `last_modified` only moves when the
    /// dates, the label or the status actually change.
    pub fn apply(&self, existing: Option<&Booking>) -> (Booking, UpsertEffect) {
        match existing {
            None => (
                Booking {
                    property: self.key.property.clone(),
                    start_date: self.start_date,
                    end_date: self.end_date,
                    guest_label: self.guest_label.clone(),
                    source: self.key.source.clone(),
                    external_id: self.key.external_id.clone(),
                    status: BookingStatus::Confirmed,
                    synced_at: self.synced_at,
                    last_modified: self.synced_at,
                    created_at: self.synced_at,
                },
                UpsertEffect::Inserted,
            ),
            Some(old) => {
                let changed = old.start_date != self.start_date
                    || old.end_date != self.end_date
                    || old.guest_label != self.guest_label
                    || old.status != BookingStatus::Confirmed;

                let mut updated = old.clone();
                updated.start_date = self.start_date;
                updated.end_date = self.end_date;
                updated.guest_label = self.guest_label.clone();
                updated.status = BookingStatus::Confirmed;
                updated.synced_at = self.synced_at;
                if changed {
                    updated.last_modified = self.synced_at;
                }
                let effect = if changed {
                    UpsertEffect::Modified
                } else {
                    UpsertEffect::Unchanged
                };
                (updated, effect)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn interval(uid: Option<&str>, summary: Option<&str>) -> Interval {
        Interval {
            start: Utc.with_ymd_and_hms(2024, 6, 8, 15, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 6, 12, 10, 0, 0).unwrap(),
            source: "Airbnb".to_string(),
            uid: uid.map(str::to_string),
            summary: summary.map(str::to_string),
        }
    }

    #[test]
    fn missing_uid_falls_back_to_property_and_start() {
        let now = Utc::now();
        let op = BookingUpsert::from_interval("villa-1", &interval(None, None), now);
        let expected_ts = Utc
            .with_ymd_and_hms(2024, 6, 8, 15, 0, 0)
            .unwrap()
            .timestamp();
        assert_eq!(op.key.external_id, format!("villa-1-{}", expected_ts));
        assert_eq!(op.guest_label, "Reserved");

        let blank = BookingUpsert::from_interval("villa-1", &interval(Some("  "), None), now);
        assert_eq!(blank.key.external_id, op.key.external_id);
    }

    #[test]
    fn update_preserves_creation_time() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let first = BookingUpsert::from_interval("villa-1", &interval(Some("evt-1"), Some("Ana")), t0);
        let (stored, effect) = first.apply(None);
        assert_eq!(effect, UpsertEffect::Inserted);
        assert_eq!(stored.created_at, t0);
        assert_eq!(stored.status, BookingStatus::Confirmed);

        let t1 = t0 + Duration::hours(3);
        let mut moved = interval(Some("evt-1"), Some("Ana"));
        moved.end += Duration::days(1);
        let second = BookingUpsert::from_interval("villa-1", &moved, t1);
        let (updated, effect) = second.apply(Some(&stored));
        assert_eq!(effect, UpsertEffect::Modified);
        assert_eq!(updated.created_at, t0);
        assert_eq!(updated.last_modified, t1);
        assert_eq!(updated.end_date, moved.end);
    }

    #[test]
    fn identical_upsert_only_refreshes_sync_time() {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let iv = interval(Some("evt-1"), None);
        let (stored, _) = BookingUpsert::from_interval("villa-1", &iv, t0).apply(None);

        let t1 = t0 + Duration::minutes(10);
        let (again, effect) = BookingUpsert::from_interval("villa-1", &iv, t1).apply(Some(&stored));
        assert_eq!(effect, UpsertEffect::Unchanged);
        assert_eq!(again.synced_at, t1);
        assert_eq!(again.last_modified, t0);
    }
}
