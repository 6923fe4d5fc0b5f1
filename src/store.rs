// File: ./src/store.rs
//! Booking persistence. The sync core only ever upserts; it never deletes.
use crate::error::StoreError;
use crate::model::booking::UpsertEffect;
use crate::model::{Booking, BookingKey, BookingUpsert};
use crate::storage::FileStorage;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const BOOKING_FILE_VERSION: u32 = 1;

/// Counts reported by one bulk write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkWriteSummary {
    /// New bookings created.
    pub upserted: usize,
    /// Existing bookings whose dates, label or status changed.
    pub modified: usize,
    /// Existing bookings matched by key, changed or not.
    pub matched: usize,
}

impl BulkWriteSummary {
    fn record(&mut self, effect: UpsertEffect) {
        match effect {
            UpsertEffect::Inserted => self.upserted += 1,
            UpsertEffect::Modified => {
                self.matched += 1;
                self.modified += 1;
            }
            UpsertEffect::Unchanged => self.matched += 1,
        }
    }
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Apply a batch of upserts. Either the whole batch is applied or an
    /// error is returned and nothing in it was written.
    async fn bulk_upsert(&self, ops: &[BookingUpsert]) -> Result<BulkWriteSummary, StoreError>;

    async fn find(&self, key: &BookingKey) -> Result<Option<Booking>, StoreError>;

    async fn list(&self) -> Result<Vec<Booking>, StoreError>;
}

type BookingTable = BTreeMap<BookingKey, Booking>;

fn apply_all(table: &mut BookingTable, ops: &[BookingUpsert]) -> BulkWriteSummary {
    let mut summary = BulkWriteSummary::default();
    for op in ops {
        let (booking, effect) = op.apply(table.get(&op.key));
        table.insert(op.key.clone(), booking);
        summary.record(effect);
    }
    summary
}

// --- In-memory store ---

#[derive(Debug, Default)]
pub struct MemoryBookingStore {
    bookings: Mutex<BookingTable>,
}

impl MemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn bulk_upsert(&self, ops: &[BookingUpsert]) -> Result<BulkWriteSummary, StoreError> {
        let mut table = self.bookings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(apply_all(&mut table, ops))
    }

    async fn find(&self, key: &BookingKey) -> Result<Option<Booking>, StoreError> {
        let table = self.bookings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(table.get(key).cloned())
    }

    async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        let table = self.bookings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(table.values().cloned().collect())
    }
}

// --- JSON file store ---

/// Bookings kept in one JSON file, rewritten atomically under a file lock
/// on every batch.
#[derive(Debug, Clone)]
pub struct JsonBookingStore {
    path: PathBuf,
}

impl JsonBookingStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_table(path: &Path) -> Result<BookingTable, StoreError> {
        let bookings: Vec<Booking> = FileStorage::read_versioned(path, BOOKING_FILE_VERSION)
            .map_err(|e| storage_error(e, StoreError::Corrupt))?
            .unwrap_or_default();
        Ok(bookings.into_iter().map(|b| (b.key(), b)).collect())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(PathBuf) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || f(path))
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }
}

/// Filesystem failures surface as `StoreError::Io`; anything else goes
/// through `other`.
fn storage_error(e: anyhow::Error, other: fn(String) -> StoreError) -> StoreError {
    match e.downcast::<std::io::Error>() {
        Ok(io) => StoreError::Io(io),
        Err(e) => other(format!("{:#}", e)),
    }
}

fn locked<T>(path: &Path, f: impl FnOnce() -> Result<T, StoreError>) -> Result<T, StoreError> {
    let mut inner: Option<Result<T, StoreError>> = None;
    FileStorage::with_lock(path, || {
        inner = Some(f());
        Ok(())
    })
    .map_err(|e| storage_error(e, StoreError::Unavailable))?;
    inner.unwrap_or_else(|| Err(StoreError::Unavailable("lock closure did not run".to_string())))
}

#[async_trait]
impl BookingStore for JsonBookingStore {
    async fn bulk_upsert(&self, ops: &[BookingUpsert]) -> Result<BulkWriteSummary, StoreError> {
        let ops = ops.to_vec();
        self.blocking(move |path| {
            locked(&path, || {
                let mut table = Self::load_table(&path)?;
                let summary = apply_all(&mut table, &ops);
                let rows: Vec<&Booking> = table.values().collect();
                FileStorage::write_versioned(&path, BOOKING_FILE_VERSION, &rows)
                    .map_err(|e| storage_error(e, StoreError::Unavailable))?;
                Ok(summary)
            })
        })
        .await
    }

    async fn find(&self, key: &BookingKey) -> Result<Option<Booking>, StoreError> {
        let key = key.clone();
        self.blocking(move |path| locked(&path, || Ok(Self::load_table(&path)?.remove(&key))))
            .await
    }

    async fn list(&self) -> Result<Vec<Booking>, StoreError> {
        self.blocking(move |path| {
            locked(&path, || Ok(Self::load_table(&path)?.into_values().collect()))
        })
        .await
    }
}
