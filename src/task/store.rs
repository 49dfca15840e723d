//! Key-value persistence for job records.
//!
//! [`KvStore`] is the storage seam; [`MemoryStore`] is the in-process
//! implementation with per-key TTLs and lazy expiry. [`JobStore`] layers
//! job-record encoding on top and owns the corrupted-snapshot policy:
//! an undecodable record is purged so the next lookup is a clean miss.

use super::record::JobRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::warn;

/// Minimal string key-value store with optional TTL.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()>;
    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> anyhow::Result<bool>;
}

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

/// In-process store; expired entries are dropped on access.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expired() => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> anyhow::Result<()> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.lock().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<bool> {
        let mut entries = self.entries.lock().await;
        match entries.remove(key) {
            Some(entry) => Ok(!entry.expired()),
            None => Ok(false),
        }
    }
}

/// Outcome of loading a job record.
pub enum LoadedRecord {
    /// No record under that id (or it expired).
    Missing,
    /// A record existed but could not be decoded; it has been purged.
    Corrupted,
    Record(Box<JobRecord>),
}

/// Job-record persistence over any [`KvStore`].
#[derive(Clone)]
pub struct JobStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl JobStore {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(job_id: &str) -> String {
        format!("task:{job_id}")
    }

    pub async fn save(&self, record: &JobRecord) -> anyhow::Result<()> {
        let encoded = serde_json::to_string(record)?;
        self.store
            .set(&Self::key(&record.job_id), &encoded, Some(self.ttl))
            .await
    }

    pub async fn load(&self, job_id: &str) -> anyhow::Result<LoadedRecord> {
        let key = Self::key(job_id);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(LoadedRecord::Missing);
        };
        match serde_json::from_str::<JobRecord>(&raw) {
            Ok(record) => Ok(LoadedRecord::Record(Box::new(record))),
            Err(err) => {
                warn!(job_id, %err, "purging undecodable job record");
                self.store.delete(&key).await?;
                Ok(LoadedRecord::Corrupted)
            }
        }
    }

    pub async fn delete(&self, job_id: &str) -> anyhow::Result<bool> {
        self.store.delete(&Self::key(job_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::PullRequestRef;

    fn record(job_id: &str) -> JobRecord {
        JobRecord::new(job_id, PullRequestRef::parse("acme/widgets", 7).unwrap())
    }

    #[tokio::test]
    async fn memory_store_set_get_delete() {
        let store = MemoryStore::new();
        store.set("k", "v", None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(store.delete("k").await.unwrap());
        assert!(store.get("k").await.unwrap().is_none());
        assert!(!store.delete("k").await.unwrap());
    }

    #[tokio::test]
    async fn memory_store_expires_entries() {
        let store = MemoryStore::new();
        store
            .set("k", "v", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn job_store_round_trips_records() {
        let job_store = JobStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        let mut rec = record("job-1");
        rec.mark_started(1);
        job_store.save(&rec).await.unwrap();
        match job_store.load("job-1").await.unwrap() {
            LoadedRecord::Record(loaded) => {
                assert_eq!(loaded.job_id, "job-1");
                assert_eq!(loaded.attempt, 1);
            }
            _ => panic!("expected record"),
        }
    }

    #[tokio::test]
    async fn missing_record_is_missing() {
        let job_store = JobStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        assert!(matches!(
            job_store.load("nope").await.unwrap(),
            LoadedRecord::Missing
        ));
    }

    #[tokio::test]
    async fn corrupted_record_is_purged() {
        let store = Arc::new(MemoryStore::new());
        store.set("task:bad", "{not json", None).await.unwrap();
        let job_store = JobStore::new(store.clone(), Duration::from_secs(60));

        assert!(matches!(
            job_store.load("bad").await.unwrap(),
            LoadedRecord::Corrupted
        ));
        // Purged, so the next lookup is a clean miss.
        assert!(matches!(
            job_store.load("bad").await.unwrap(),
            LoadedRecord::Missing
        ));
    }
}
