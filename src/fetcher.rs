// File: ./src/fetcher.rs
//! Bounded, time-limited feed fetching.
//!
//! The limiter is a single semaphore created with the engine and shared by
//! every pass, so overlapping callers cannot exceed the configured number of
//! in-flight requests either.
use crate::client::FeedClient;
use crate::error::FetchError;
use crate::model::{IcsAdapter, ParsedEvent};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Anything that can return the raw text of a feed URL.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await
    }
}

pub struct FeedFetcher {
    source: Arc<dyn FeedSource>,
    limiter: Arc<Semaphore>,
    timeout: Duration,
}

impl FeedFetcher {
    pub fn new(source: Arc<dyn FeedSource>, max_concurrent: usize, timeout: Duration) -> Self {
        Self {
            source,
            limiter: Arc::new(Semaphore::new(max_concurrent.max(1))),
            timeout,
        }
    }

    pub fn available_slots(&self) -> usize {
        self.limiter.available_permits()
    }

    /// Fetch and parse one feed. Waits for a limiter slot first; the slot is
    /// released when the fetch completes, fails or times out.
    pub async fn fetch_events(&self, url: &str) -> Result<Vec<ParsedEvent>, FetchError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| FetchError::LimiterClosed)?;

        let body = tokio::time::timeout(self.timeout, self.source.fetch(url))
            .await
            .map_err(|_| FetchError::Timeout(self.timeout))??;

        IcsAdapter::events_from_ics(&body).map_err(FetchError::Parse)
    }
}
