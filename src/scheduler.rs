// File: ./src/scheduler.rs
use crate::engine::SyncEngine;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};

/// Run a pass immediately, then every `period`, until `shutdown` resolves.
///
/// A pass that outlasts the period makes the scheduler skip the missed
/// ticks instead of firing them back to back. Shutdown is only observed
/// between passes; a running pass is allowed to finish.
pub async fn run_scheduler<F>(engine: Arc<SyncEngine>, period: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    tokio::pin!(shutdown);

    log::info!("Scheduler started, syncing every {:?}", period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                engine.synchronize_all().await;
            }
            _ = &mut shutdown => {
                log::info!("Shutdown requested, scheduler stopped");
                break;
            }
        }
    }
}
