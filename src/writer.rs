// File: ./src/writer.rs
//! Turns reconciled bookings into batched, idempotent upserts.
use crate::model::{BookingUpsert, Interval, same_slot};
use crate::store::BookingStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Totals returned by a synchronization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub total_upserted: usize,
    pub total_modified: usize,
    pub total_operations: usize,
}

/// One upsert together with the reconciled interval it was built from.
#[derive(Debug, Clone)]
pub struct PlannedWrite {
    pub property_id: String,
    pub interval: Interval,
    pub upsert: BookingUpsert,
}

pub struct PersistenceWriter {
    store: Arc<dyn BookingStore>,
    batch_size: usize,
    /// Last interval successfully written per property.
    persisted: Mutex<HashMap<String, Interval>>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn BookingStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
            persisted: Mutex::new(HashMap::new()),
        }
    }

    /// Build one upsert per property with an active booking. A property whose
    /// active booking was already written unchanged is skipped, so a pass
    /// that changes nothing writes nothing.
    pub fn plan(&self, active: &[(String, Interval)], now: DateTime<Utc>) -> Vec<PlannedWrite> {
        let persisted = self.persisted.lock().unwrap_or_else(|e| e.into_inner());
        active
            .iter()
            .filter(|(property_id, interval)| {
                !same_slot(persisted.get(property_id), Some(interval))
                    || persisted.get(property_id).map(|p| (&p.uid, &p.summary))
                        != Some((&interval.uid, &interval.summary))
            })
            .map(|(property_id, interval)| PlannedWrite {
                property_id: property_id.clone(),
                interval: interval.clone(),
                upsert: BookingUpsert::from_interval(property_id, interval, now),
            })
            .collect()
    }

    /// Execute planned writes in sequential batches. A failed batch is logged
    /// and left out of the summary; the next batch still runs, and the failed
    /// properties are planned again on the next pass.
    pub async fn execute(&self, plan: Vec<PlannedWrite>) -> SyncSummary {
        let mut summary = SyncSummary::default();

        let batch_count = plan.len().div_ceil(self.batch_size);
        for (index, batch) in plan.chunks(self.batch_size).enumerate() {
            let ops: Vec<BookingUpsert> = batch.iter().map(|w| w.upsert.clone()).collect();
            match self.store.bulk_upsert(&ops).await {
                Ok(result) => {
                    summary.total_operations += ops.len();
                    summary.total_upserted += result.upserted;
                    summary.total_modified += result.modified;
                    let mut persisted = self.persisted.lock().unwrap_or_else(|e| e.into_inner());
                    for write in batch {
                        persisted.insert(write.property_id.clone(), write.interval.clone());
                    }
                    log::debug!(
                        "Booking batch {}/{}: {} ops, {} new, {} modified",
                        index + 1,
                        batch_count,
                        ops.len(),
                        result.upserted,
                        result.modified
                    );
                }
                Err(e) => {
                    log::error!(
                        "Booking batch {}/{} ({} ops) failed: {}",
                        index + 1,
                        batch_count,
                        ops.len(),
                        e
                    );
                }
            }
        }
        summary
    }
}
