use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::day_summary::{DaySummary, DaySummaryPoint};
use crate::error::Result;

/// Durable storage of completed day summaries, at most one record per
/// calendar date. Implementations back the write-through persistence of
/// the day-summary fetch policy.
#[async_trait]
pub trait DaySummaryStore: Send + Sync {
    async fn get(&self, date: NaiveDate) -> Result<Option<DaySummary>>;
    async fn put(&self, summary: &DaySummary) -> Result<()>;
}

/// Single-file JSON store: one map of date to samples, rewritten on each
/// put. Day summaries are small (a few hundred points per day) and
/// writes happen at most once per completed day.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<BTreeMap<NaiveDate, Vec<DaySummaryPoint>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl DaySummaryStore for JsonFileStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<DaySummary>> {
        let _guard = self.lock.lock().unwrap();
        let records = self.load()?;
        Ok(records
            .get(&date)
            .map(|points| DaySummary { date, points: points.clone() }))
    }

    async fn put(&self, summary: &DaySummary) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        let mut records = self.load()?;
        records.insert(summary.date, summary.points.clone());
        std::fs::write(&self.path, serde_json::to_vec_pretty(&records)?)?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral setups.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<NaiveDate, Vec<DaySummaryPoint>>>,
    puts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls, for asserting at-most-once persistence.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DaySummaryStore for MemoryStore {
    async fn get(&self, date: NaiveDate) -> Result<Option<DaySummary>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&date)
            .map(|points| DaySummary { date, points: points.clone() }))
    }

    async fn put(&self, summary: &DaySummary) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .unwrap()
            .insert(summary.date, summary.points.clone());
        Ok(())
    }
}
