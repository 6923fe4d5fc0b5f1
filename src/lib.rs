// Crate root library declaration and module exports.
pub mod client;
pub mod clock;
pub mod config;
pub mod context;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod model;
pub mod properties;
pub mod reconciler;
pub mod scheduler;
pub mod snapshot;
pub mod storage;
pub mod store;
#[cfg(any(test, feature = "test_hooks"))]
pub mod testing;
pub mod trigger;
pub mod writer;

pub use engine::{EngineDeps, PassReport, SourceOutcome, SyncEngine};
pub use writer::SyncSummary;
