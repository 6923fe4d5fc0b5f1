// File: ./src/snapshot.rs
//! Optional on-disk copy of the reconciler state, so stabilization history
//! survives a restart when `persist_sync_state` is enabled.
use crate::context::AppContext;
use crate::reconciler::PropertySyncState;
use crate::storage::FileStorage;
use anyhow::{Result, anyhow};
use std::collections::HashMap;

// Bump whenever PropertySyncState, Candidate or Interval change shape.
const SYNC_STATE_VERSION: u32 = 1;

pub struct SyncStateSnapshot;

impl SyncStateSnapshot {
    pub fn save(ctx: &dyn AppContext, states: &HashMap<String, PropertySyncState>) -> Result<()> {
        let path = ctx
            .get_sync_state_path()
            .ok_or_else(|| anyhow!("Could not determine sync state path"))?;
        FileStorage::with_lock(&path, || {
            FileStorage::write_versioned(&path, SYNC_STATE_VERSION, states)
        })
    }

    /// A missing file is an empty map. An unreadable or outdated file is
    /// also treated as empty (and logged): the reconciler rebuilds its
    /// history within one stability window.
    pub fn load(ctx: &dyn AppContext) -> HashMap<String, PropertySyncState> {
        let Some(path) = ctx.get_sync_state_path() else {
            return HashMap::new();
        };
        let loaded = FileStorage::with_lock(&path, || {
            FileStorage::read_versioned::<HashMap<String, PropertySyncState>>(
                &path,
                SYNC_STATE_VERSION,
            )
        });
        match loaded {
            Ok(states) => states.unwrap_or_default(),
            Err(e) => {
                log::warn!("Ignoring sync state snapshot: {:#}", e);
                HashMap::new()
            }
        }
    }
}
