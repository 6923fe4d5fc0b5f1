// File: ./src/trigger.rs
//! Hooks into mission automation, fired after bookings change.
use crate::client::FeedClient;
use crate::clock::SharedClock;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

/// The downstream system that schedules cleaning missions from bookings.
#[async_trait]
pub trait MissionAutomation: Send + Sync {
    async fn process_upcoming_bookings(&self) -> Result<()>;
    async fn process_recently_ended_bookings(&self) -> Result<()>;
}

/// Used when no webhook is configured.
#[derive(Debug, Default)]
pub struct LoggingAutomation;

#[async_trait]
impl MissionAutomation for LoggingAutomation {
    async fn process_upcoming_bookings(&self) -> Result<()> {
        log::info!("Upcoming bookings changed (no automation configured)");
        Ok(())
    }

    async fn process_recently_ended_bookings(&self) -> Result<()> {
        log::info!("A booking ended (no automation configured)");
        Ok(())
    }
}

/// POSTs a small JSON notice to each configured URL. A hook without a URL
/// is a no-op.
#[derive(Debug, Clone)]
pub struct WebhookAutomation {
    client: FeedClient,
    clock: SharedClock,
    upcoming_url: Option<String>,
    ended_url: Option<String>,
}

impl WebhookAutomation {
    pub fn new(
        client: FeedClient,
        clock: SharedClock,
        upcoming_url: Option<String>,
        ended_url: Option<String>,
    ) -> Self {
        Self {
            client,
            clock,
            upcoming_url,
            ended_url,
        }
    }

    async fn notify(&self, url: Option<&str>, event: &str) -> Result<()> {
        let Some(url) = url else {
            return Ok(());
        };
        let body = serde_json::json!({
            "event": event,
            "at": self.clock.now().to_rfc3339(),
        });
        self.client
            .post_json(url, body.to_string())
            .await
            .with_context(|| format!("{} hook at {}", event, url))
    }
}

#[async_trait]
impl MissionAutomation for WebhookAutomation {
    async fn process_upcoming_bookings(&self) -> Result<()> {
        self.notify(self.upcoming_url.as_deref(), "upcoming_bookings")
            .await
    }

    async fn process_recently_ended_bookings(&self) -> Result<()> {
        self.notify(self.ended_url.as_deref(), "recently_ended_bookings")
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    Upcoming,
    RecentlyEnded,
}

/// Fires automation hooks as detached tasks. The pass never waits for the
/// automation or sees its errors; they are logged inside the task. Tasks are
/// tracked so the process can let in-flight hooks finish before it exits.
#[derive(Clone)]
pub struct DownstreamTrigger {
    automation: Arc<dyn MissionAutomation>,
    tasks: TaskTracker,
}

impl DownstreamTrigger {
    pub fn new(automation: Arc<dyn MissionAutomation>) -> Self {
        Self {
            automation,
            tasks: TaskTracker::new(),
        }
    }

    /// Hooks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait up to `timeout` for every spawned hook to finish. Returns `false`
    /// if some were still running. Hooks fired afterwards are tracked again.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tasks.close();
        let drained = tokio::time::timeout(timeout, self.tasks.wait())
            .await
            .is_ok();
        self.tasks.reopen();
        if !drained {
            log::warn!(
                "{} automation hook(s) still running after {:?}",
                self.tasks.len(),
                timeout
            );
        }
        drained
    }

    fn spawn(&self, hook: Hook) -> JoinHandle<()> {
        let automation = self.automation.clone();
        self.tasks.spawn(async move {
            let result = match hook {
                Hook::Upcoming => automation.process_upcoming_bookings().await,
                Hook::RecentlyEnded => automation.process_recently_ended_bookings().await,
            };
            if let Err(e) = result {
                log::error!("Mission automation ({:?}) failed: {:#}", hook, e);
            }
        })
    }

    pub fn fire_upcoming(&self) -> JoinHandle<()> {
        self.spawn(Hook::Upcoming)
    }

    pub fn fire_recently_ended(&self) -> JoinHandle<()> {
        self.spawn(Hook::RecentlyEnded)
    }

    /// End-of-pass notification: both hooks, independently.
    pub fn fire_all(&self) -> Vec<JoinHandle<()>> {
        vec![self.fire_upcoming(), self.fire_recently_ended()]
    }
}
