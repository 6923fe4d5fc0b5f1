// File: ./src/engine.rs
/*! One synchronization pass over every property.

A pass lists the properties, fetches all of their calendar sources
concurrently (bounded by the fetcher's limiter, skipped when debounced),
reduces each property to one dominant interval, runs it through the
reconciler, writes the resulting active bookings in batches and finally
notifies mission automation.

Nothing that goes wrong inside a pass aborts it: feed failures become
`SourceOutcome::Failed`, store failures are logged per batch and
automation failures are logged in their own task.
*/

use crate::client::FeedClient;
use crate::clock::{SharedClock, SystemClock};
use crate::config::{Config, SyncSettings};
use crate::context::SharedContext;
use crate::debounce::DebounceLedger;
use crate::extract::{extract_interval, select_dominant};
use crate::fetcher::{FeedFetcher, FeedSource};
use crate::model::{CalendarSource, Interval, Property};
use crate::properties::{ConfigPropertyStore, PropertyStore};
use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::snapshot::SyncStateSnapshot;
use crate::store::{BookingStore, JsonBookingStore};
use crate::trigger::{DownstreamTrigger, LoggingAutomation, MissionAutomation, WebhookAutomation};
use crate::writer::{PersistenceWriter, SyncSummary};
use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

/// The engine's external collaborators.
pub struct EngineDeps {
    pub properties: Arc<dyn PropertyStore>,
    pub feeds: Arc<dyn FeedSource>,
    pub bookings: Arc<dyn BookingStore>,
    pub automation: Arc<dyn MissionAutomation>,
    pub clock: SharedClock,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Fetched and parsed; `events` counts every VEVENT in the feed.
    Fetched {
        interval: Option<Interval>,
        events: usize,
    },
    /// Skipped by the debounce ledger; the interval is the one from the last
    /// successful fetch, if it has not ended since.
    Debounced { interval: Option<Interval> },
    Failed { error: String },
}

impl SourceOutcome {
    pub fn interval(&self) -> Option<&Interval> {
        match self {
            SourceOutcome::Fetched { interval, .. } | SourceOutcome::Debounced { interval } => {
                interval.as_ref()
            }
            SourceOutcome::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceResult {
    pub property_id: String,
    pub label: String,
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyReport {
    pub property_id: String,
    pub dominant: Option<Interval>,
    pub reconcile: ReconcileOutcome,
}

/// Everything one pass observed and did.
#[derive(Debug, Clone, Default)]
pub struct PassReport {
    pub summary: SyncSummary,
    pub sources: Vec<SourceResult>,
    pub properties: Vec<PropertyReport>,
    /// `(property id, booking that ended)` for each release detected.
    pub releases: Vec<(String, Interval)>,
}

pub struct SyncEngine {
    properties: Arc<dyn PropertyStore>,
    fetcher: FeedFetcher,
    debounce: DebounceLedger,
    reconciler: Reconciler,
    writer: PersistenceWriter,
    trigger: DownstreamTrigger,
    clock: SharedClock,
    // Held for the whole pass; an overlapping caller waits.
    pass_guard: tokio::sync::Mutex<()>,
    snapshot_ctx: Option<SharedContext>,
}

impl SyncEngine {
    pub fn new(settings: SyncSettings, deps: EngineDeps) -> Self {
        Self {
            properties: deps.properties,
            fetcher: FeedFetcher::new(
                deps.feeds,
                settings.max_concurrent_fetches,
                settings.fetch_timeout,
            ),
            debounce: DebounceLedger::new(settings.debounce_window),
            reconciler: Reconciler::new(deps.clock.clone(), settings.stability_window),
            writer: PersistenceWriter::new(deps.bookings, settings.batch_size),
            trigger: DownstreamTrigger::new(deps.automation),
            clock: deps.clock,
            pass_guard: tokio::sync::Mutex::new(()),
            snapshot_ctx: None,
        }
    }

    /// Production wiring: HTTP feeds, properties from the config, the JSON
    /// booking file in the data dir and webhook automation when configured.
    pub fn from_config(config: &Config, ctx: SharedContext) -> Result<Self> {
        let client = FeedClient::new(&config.user_agent, config.max_redirects)
            .map_err(anyhow::Error::msg)?;
        let clock: SharedClock = Arc::new(SystemClock);

        let automation: Arc<dyn MissionAutomation> = if config.automation.is_configured() {
            Arc::new(WebhookAutomation::new(
                client.clone(),
                clock.clone(),
                config.automation.upcoming_url.clone(),
                config.automation.ended_url.clone(),
            ))
        } else {
            Arc::new(LoggingAutomation)
        };

        let booking_path = config.booking_store_path(ctx.as_ref())?;
        log::info!("Bookings are stored in {}", booking_path.display());

        let engine = Self::new(
            config.sync_settings(),
            EngineDeps {
                properties: Arc::new(ConfigPropertyStore::new(config.properties.clone())),
                feeds: Arc::new(client),
                bookings: Arc::new(JsonBookingStore::new(booking_path)),
                automation,
                clock,
            },
        );

        Ok(if config.persist_sync_state {
            engine.with_snapshot(ctx)
        } else {
            engine
        })
    }

    /// Restore reconciler state from the context's snapshot file and save it
    /// back after every pass.
    pub fn with_snapshot(mut self, ctx: SharedContext) -> Self {
        let states = SyncStateSnapshot::load(ctx.as_ref());
        if !states.is_empty() {
            log::info!("Restored sync state for {} properties", states.len());
        }
        self.reconciler.restore(states);
        self.snapshot_ctx = Some(ctx);
        self
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Wait up to `timeout` for automation hooks fired by earlier passes.
    /// Call before the runtime shuts down, or in-flight hooks are cancelled.
    pub async fn drain_triggers(&self, timeout: std::time::Duration) -> bool {
        self.trigger.drain(timeout).await
    }

    /// Run one pass and return only its totals.
    pub async fn synchronize_all(&self) -> SyncSummary {
        self.run_pass().await.summary
    }

    pub async fn run_pass(&self) -> PassReport {
        let _guard = self.pass_guard.lock().await;
        let now = self.clock.now();

        let properties = match self.properties.list_properties().await {
            Ok(properties) => dedup_properties(properties),
            Err(e) => {
                log::error!("Could not list properties, skipping pass: {:#}", e);
                return PassReport::default();
            }
        };

        let per_property = join_all(
            properties
                .iter()
                .map(|property| self.sync_property(property, now)),
        )
        .await;

        let mut report = PassReport::default();
        let mut active = Vec::new();
        for (sources, property) in per_property {
            if let Some(ended) = &property.reconcile.released {
                report
                    .releases
                    .push((property.property_id.clone(), ended.clone()));
                self.trigger.fire_recently_ended();
            }
            if let Some(booking) = &property.reconcile.active {
                active.push((property.property_id.clone(), booking.clone()));
            }
            report.sources.extend(sources);
            report.properties.push(property);
        }

        let plan = self.writer.plan(&active, now);
        report.summary = self.writer.execute(plan).await;

        self.trigger.fire_all();

        if let Some(ctx) = &self.snapshot_ctx {
            let ctx = ctx.clone();
            let states = self.reconciler.export();
            let saved =
                tokio::task::spawn_blocking(move || SyncStateSnapshot::save(ctx.as_ref(), &states))
                    .await;
            match saved {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("Failed to save sync state: {:#}", e),
                Err(e) => log::warn!("Sync state save task failed: {}", e),
            }
        }

        let failed = report
            .sources
            .iter()
            .filter(|s| matches!(s.outcome, SourceOutcome::Failed { .. }))
            .count();
        log::info!(
            "Sync pass: {} properties, {} sources ({} failed), {} upserted, {} modified, {} operations",
            report.properties.len(),
            report.sources.len(),
            failed,
            report.summary.total_upserted,
            report.summary.total_modified,
            report.summary.total_operations
        );
        report
    }

    async fn sync_property(
        &self,
        property: &Property,
        now: DateTime<Utc>,
    ) -> (Vec<SourceResult>, PropertyReport) {
        // join_all keeps input order, so intervals stay in source order.
        let sources = join_all(
            property
                .syncable_sources()
                .map(|source| self.sync_source(&property.id, source, now)),
        )
        .await;

        let intervals: Vec<Interval> = sources
            .iter()
            .filter_map(|s| s.outcome.interval().cloned())
            .collect();
        let dominant = select_dominant(&intervals);
        let reconcile = self.reconciler.reconcile(&property.id, dominant.clone());

        (
            sources,
            PropertyReport {
                property_id: property.id.clone(),
                dominant,
                reconcile,
            },
        )
    }

    async fn sync_source(
        &self,
        property_id: &str,
        source: &CalendarSource,
        now: DateTime<Utc>,
    ) -> SourceResult {
        let result = |outcome| SourceResult {
            property_id: property_id.to_string(),
            label: source.label.clone(),
            outcome,
        };

        if let Some(entry) = self.debounce.lookup(property_id, &source.label, now) {
            log::debug!("{}/{}: debounced", property_id, source.label);
            return result(SourceOutcome::Debounced {
                interval: entry.interval.filter(|i| i.end > now),
            });
        }

        match self.fetcher.fetch_events(&source.url).await {
            Ok(events) => {
                let interval = extract_interval(&events, &source.label, now);
                self.debounce
                    .record(property_id, &source.label, now, interval.clone());
                result(SourceOutcome::Fetched {
                    interval,
                    events: events.len(),
                })
            }
            Err(e) => {
                log::warn!("{}/{}: fetch failed: {}", property_id, source.label, e);
                result(SourceOutcome::Failed {
                    error: e.to_string(),
                })
            }
        }
    }
}

/// Keep the first property for each id. Each property must be reconciled
/// at most once per pass.
fn dedup_properties(properties: Vec<Property>) -> Vec<Property> {
    let mut seen = HashSet::new();
    properties
        .into_iter()
        .filter(|property| {
            let first = seen.insert(property.id.clone());
            if !first {
                log::warn!(
                    "Property '{}' listed more than once; ignoring the duplicate",
                    property.id
                );
            }
            first
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryBookingStore;
    use crate::testing::{RecordingAutomation, StaticFeeds, ics_feed};
    use chrono::{Duration, TimeZone};

    struct Harness {
        clock: Arc<ManualClock>,
        feeds: Arc<StaticFeeds>,
        engine: SyncEngine,
    }

    fn harness(properties: Vec<Property>) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
        ));
        let feeds = Arc::new(StaticFeeds::new());
        let engine = SyncEngine::new(
            SyncSettings::default(),
            EngineDeps {
                properties: Arc::new(ConfigPropertyStore::new(properties)),
                feeds: feeds.clone(),
                bookings: Arc::new(MemoryBookingStore::new()),
                automation: Arc::new(RecordingAutomation::default()),
                clock: clock.clone(),
            },
        );
        Harness {
            clock,
            feeds,
            engine,
        }
    }

    #[tokio::test]
    async fn inactive_and_blank_sources_are_not_fetched() {
        let mut off = CalendarSource::new("Off", "mem://off");
        off.active = false;
        let blank = CalendarSource::new("Blank", "  ");
        let on = CalendarSource::new("On", "mem://on");
        let h = harness(vec![Property::new("p", vec![off, blank, on])]);
        h.feeds.set("mem://on", ics_feed(&[]));

        let report = h.engine.run_pass().await;
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].label, "On");
        assert_eq!(h.feeds.total_fetches(), 1);
    }

    #[tokio::test]
    async fn debounced_source_keeps_its_interval_until_it_ends() {
        let h = harness(vec![Property::new(
            "p",
            vec![CalendarSource::new("A", "mem://a")],
        )]);
        // Ends at 09:03, three minutes after the first pass.
        h.feeds
            .set("mem://a", ics_feed(&[("a1", "20240601T080000Z", "20240601T090300Z")]));

        let first = h.engine.run_pass().await;
        assert!(first.sources[0].outcome.interval().is_some());

        h.clock.advance(Duration::minutes(2));
        let second = h.engine.run_pass().await;
        assert!(matches!(
            second.sources[0].outcome,
            SourceOutcome::Debounced { interval: Some(_) }
        ));

        h.clock.advance(Duration::minutes(2));
        let third = h.engine.run_pass().await;
        assert_eq!(
            third.sources[0].outcome,
            SourceOutcome::Debounced { interval: None }
        );
        assert_eq!(h.feeds.fetch_count("mem://a"), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_retried_next_pass() {
        let h = harness(vec![Property::new(
            "p",
            vec![CalendarSource::new("A", "mem://a")],
        )]);
        h.feeds.fail("mem://a", "connection refused");

        let first = h.engine.run_pass().await;
        assert!(matches!(
            first.sources[0].outcome,
            SourceOutcome::Failed { .. }
        ));

        h.feeds.set("mem://a", ics_feed(&[]));
        h.clock.advance(Duration::minutes(1));
        let second = h.engine.run_pass().await;
        assert!(matches!(
            second.sources[0].outcome,
            SourceOutcome::Fetched { events: 0, .. }
        ));
        assert_eq!(h.feeds.fetch_count("mem://a"), 2);
    }

    #[tokio::test]
    async fn duplicate_property_ids_are_reconciled_once() {
        let first = Property::new("p", vec![CalendarSource::new("A", "mem://a")]);
        let mut again = Property::new("p", vec![CalendarSource::new("B", "mem://b")]);
        again.name = "copy".to_string();
        let h = harness(vec![first, again]);
        h.feeds
            .set("mem://a", ics_feed(&[("a1", "20240605", "20240610")]));
        h.feeds
            .set("mem://b", ics_feed(&[("b1", "20240606", "20240612")]));

        let report = h.engine.run_pass().await;
        assert_eq!(report.properties.len(), 1);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].label, "A");
        assert_eq!(h.feeds.fetch_count("mem://b"), 0);

        let state = h.engine.reconciler().state("p").unwrap();
        assert_eq!(state.candidate.unwrap().interval.unwrap().source, "A");
    }
}
