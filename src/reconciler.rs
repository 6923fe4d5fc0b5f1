// File: ./src/reconciler.rs
/*! Per-property occupancy state machine.

Feeds disagree for a while after every change: one platform updates before
another, or a feed briefly drops an event. The reconciler only lets a new
dominant interval replace the active booking after it has been observed
unchanged for the stability window, and the same rule applies to the
disappearance of the active booking (a release).

Each pass feeds one dominant interval (possibly absent) per property:

1. equal to the active booking: nothing changes, a pending candidate is dropped;
2. equal to the pending candidate: promoted once the candidate is old enough;
3. anything else: becomes the new candidate and the stability clock restarts.
*/

use crate::clock::SharedClock;
use crate::model::{Interval, same_slot};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// A value waiting out the stability window. `interval: None` is a pending
/// release, which is different from having no candidate at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub interval: Option<Interval>,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySyncState {
    pub active_booking: Option<Interval>,
    pub candidate: Option<Candidate>,
    pub last_active_booking: Option<Interval>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Empty,
    CandidatePending,
    Active,
    ReleasePending,
}

impl PropertySyncState {
    pub fn phase(&self) -> SyncPhase {
        match (&self.active_booking, &self.candidate) {
            (None, None) => SyncPhase::Empty,
            (None, Some(_)) => SyncPhase::CandidatePending,
            (Some(_), None) => SyncPhase::Active,
            (Some(_), Some(c)) if c.interval.is_none() => SyncPhase::ReleasePending,
            (Some(_), Some(_)) => SyncPhase::CandidatePending,
        }
    }
}

/// Result of one reconciliation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Active booking after this step.
    pub active: Option<Interval>,
    pub promoted: bool,
    /// The booking that just ended, set only on the step where the active
    /// booking went from present to absent.
    pub released: Option<Interval>,
    pub phase: SyncPhase,
}

#[derive(Debug)]
pub struct Reconciler {
    clock: SharedClock,
    stability_window: Duration,
    states: Mutex<HashMap<String, PropertySyncState>>,
}

impl Reconciler {
    pub fn new(clock: SharedClock, stability_window: Duration) -> Self {
        Self {
            clock,
            stability_window,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Apply one pass's dominant interval to a property.
    pub fn reconcile(&self, property_id: &str, dominant: Option<Interval>) -> ReconcileOutcome {
        let now = self.clock.now();
        let mut states = self.states.lock().unwrap_or_else(|e| e.into_inner());
        let state = states.entry(property_id.to_string()).or_default();

        let mut promoted = false;
        let mut released = None;

        if same_slot(dominant.as_ref(), state.active_booking.as_ref()) {
            state.candidate = None;
        } else if let Some(candidate) = state
            .candidate
            .as_ref()
            .filter(|c| same_slot(dominant.as_ref(), c.interval.as_ref()))
        {
            if now - candidate.since >= self.stability_window {
                let previous = state.active_booking.take();
                if dominant.is_none() {
                    released = previous.clone();
                }
                state.last_active_booking = previous;
                state.active_booking = dominant;
                state.candidate = None;
                promoted = true;
            }
        } else {
            state.candidate = Some(Candidate {
                interval: dominant,
                since: now,
            });
        }

        if promoted {
            match (&state.active_booking, &released) {
                (Some(active), _) => log::info!(
                    "Property {}: booking {} -> {} ({}) confirmed",
                    property_id,
                    active.start,
                    active.end,
                    active.source
                ),
                (None, Some(ended)) => log::info!(
                    "Property {}: booking from {} released (ended {})",
                    property_id,
                    ended.source,
                    ended.end
                ),
                (None, None) => {}
            }
        }

        ReconcileOutcome {
            active: state.active_booking.clone(),
            promoted,
            released,
            phase: state.phase(),
        }
    }

    pub fn state(&self, property_id: &str) -> Option<PropertySyncState> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(property_id)
            .cloned()
    }

    /// Copy of every property's state, for the snapshot file.
    pub fn export(&self) -> HashMap<String, PropertySyncState> {
        self.states.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace all states, e.g. from a snapshot loaded at startup.
    pub fn restore(&self, states: HashMap<String, PropertySyncState>) {
        *self.states.lock().unwrap_or_else(|e| e.into_inner()) = states;
    }
}
