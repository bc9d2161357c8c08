//! StateStore: redb-backed persistence for depthscale.
//!
//! Provides typed operations over metric samples and pool records. All
//! values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use depthscale_core::MetricSample;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    /// Disambiguates samples stamped within the same millisecond.
    seq: Arc<AtomicU64>,
}

/// Inclusive key bounds covering every sample of one series.
fn series_bounds<'a>(namespace: &'a str, name: &'a str) -> (SampleKey<'a>, SampleKey<'a>) {
    ((namespace, name, 0, 0), (namespace, name, u64::MAX, u64::MAX))
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::from_db(db);
        store.ensure_tables()?;
        store.resume_sequence()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::from_db(db);
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn from_db(db: Database) -> Self {
        Self {
            db: Arc::new(db),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        txn.open_table(POOLS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Continue sample sequence numbers after the highest one on disk.
    fn resume_sequence(&self) -> StateResult<()> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        let mut next = 0u64;
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            next = next.max(key.value().3.saturating_add(1));
        }
        self.seq.store(next, Ordering::Relaxed);
        Ok(())
    }

    // ── Samples ────────────────────────────────────────────────────

    /// Append a metric sample to its series.
    ///
    /// Returns the sample as stored, carrying its assigned sequence number.
    /// Non-finite values are rejected: they have no JSON representation.
    pub fn put_sample(&self, sample: &MetricSample) -> StateResult<MetricSample> {
        if !sample.value.is_finite() {
            return Err(StateError::Serialize(format!(
                "non-finite value for {}",
                sample.series_key()
            )));
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let stored = MetricSample {
            sequence: seq,
            ..sample.clone()
        };
        let key: SampleKey<'_> = (
            stored.namespace.as_str(),
            stored.name.as_str(),
            stored.timestamp_ms,
            seq,
        );
        let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
            table.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            namespace = %stored.namespace,
            name = %stored.name,
            seq,
            value = stored.value,
            "sample stored"
        );
        Ok(stored)
    }

    /// Most recent sample of a series, if any.
    pub fn latest_sample(&self, namespace: &str, name: &str) -> StateResult<Option<MetricSample>> {
        Ok(self.list_samples(namespace, name, 1)?.pop())
    }

    /// Up to `limit` samples of a series, newest first.
    pub fn list_samples(
        &self,
        namespace: &str,
        name: &str,
        limit: usize,
    ) -> StateResult<Vec<MetricSample>> {
        let (start, end) = series_bounds(namespace, name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table
            .range(start..=end)
            .map_err(map_err!(Read))?
            .rev()
        {
            if results.len() >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let sample: MetricSample =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(sample);
        }
        Ok(results)
    }

    /// Latest sample of every series, ordered by namespace then name.
    pub fn latest_samples(&self) -> StateResult<Vec<MetricSample>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
        let mut results: Vec<MetricSample> = Vec::new();
        // Keys sort by series then time, so the last entry per series wins.
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let sample: MetricSample =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            match results.last_mut() {
                Some(last) if last.namespace == sample.namespace && last.name == sample.name => {
                    *last = sample
                }
                _ => results.push(sample),
            }
        }
        Ok(results)
    }

    /// Keep only the newest `keep` samples of a series. Returns number deleted.
    pub fn prune_samples(&self, namespace: &str, name: &str, keep: usize) -> StateResult<u32> {
        let (start, end) = series_bounds(namespace, name);
        // Collect (timestamp, sequence) pairs in a read transaction first.
        let stale: Vec<(u64, u64)> = {
            let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
            let table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
            let keys = table
                .range(start..=end)
                .map_err(map_err!(Read))?
                .rev()
                .skip(keep)
                .map(|entry| {
                    entry.map(|(key, _)| {
                        let (_, _, timestamp_ms, seq) = key.value();
                        (timestamp_ms, seq)
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err!(Read))?;
            keys
        };

        if stale.is_empty() {
            return Ok(0);
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let mut count = 0u32;
        {
            let mut table = txn.open_table(SAMPLES).map_err(map_err!(Table))?;
            for &(timestamp_ms, seq) in &stale {
                if table
                    .remove((namespace, name, timestamp_ms, seq))
                    .map_err(map_err!(Write))?
                    .is_some()
                {
                    count += 1;
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(namespace, name, count, "samples pruned");
        Ok(count)
    }

    // ── Pools ──────────────────────────────────────────────────────

    /// Insert or update a pool record.
    pub fn put_pool(&self, record: &PoolRecord) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(POOLS).map_err(map_err!(Table))?;
            table
                .insert(record.name.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(pool = %record.name, capacity = record.current_capacity, "pool record stored");
        Ok(())
    }

    /// Get a pool record by name.
    pub fn get_pool(&self, name: &str) -> StateResult<Option<PoolRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POOLS).map_err(map_err!(Table))?;
        match table.get(name).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: PoolRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all pool records.
    pub fn list_pools(&self) -> StateResult<Vec<PoolRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(POOLS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: PoolRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }
}
