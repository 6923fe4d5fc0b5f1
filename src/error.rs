// File: ./src/error.rs
//! Typed failures for the two seams callers match on: fetching a feed and
//! writing bookings. Everything else uses `anyhow`.

use std::time::Duration;
use thiserror::Error;

/// Why one (property, source) fetch produced no events.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid feed url '{0}'")]
    InvalidUrl(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected HTTP status {0}")]
    Status(http::StatusCode),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("feed could not be parsed: {0}")]
    Parse(String),

    #[error("fetch limiter closed")]
    LimiterClosed,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("booking store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("booking store file is corrupt: {0}")]
    Corrupt(String),

    #[error("booking store unavailable: {0}")]
    Unavailable(String),
}
