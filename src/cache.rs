//! Fingerprint cache: the idempotency barrier in front of job creation.
//!
//! Keys are a stable hash of the pull request identity, so resubmitting
//! the same PR within the TTL returns the prior result instead of
//! spending another inference run. The cache degrades to a no-op on any
//! store error; a broken cache must never fail a submission.

use crate::review::{AnalysisResult, PullRequestRef};
use crate::task::KvStore;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Stable fingerprint of a pull request identity: lowercase hex SHA-256
/// of `repo:number`.
pub fn fingerprint(pr: &PullRequestRef) -> String {
    let digest = Sha256::digest(pr.fingerprint_source().as_bytes());
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // infallible for String
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// TTL-bound result cache keyed by pull request fingerprint.
#[derive(Clone)]
pub struct FingerprintCache {
    store: Option<Arc<dyn KvStore>>,
    ttl: Duration,
}

impl FingerprintCache {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self {
            store: Some(store),
            ttl,
        }
    }

    /// A cache that never hits and never stores.
    pub fn disabled() -> Self {
        Self {
            store: None,
            ttl: Duration::ZERO,
        }
    }

    fn key(pr: &PullRequestRef) -> String {
        format!("cache:pr:{}", fingerprint(pr))
    }

    /// Look up a fresh result. Store errors and undecodable entries are
    /// treated as misses.
    pub async fn get(&self, pr: &PullRequestRef) -> Option<AnalysisResult> {
        let store = self.store.as_ref()?;
        let raw = match store.get(&Self::key(pr)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(pr = %pr, %err, "cache lookup failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(result) => {
                debug!(pr = %pr, "cache hit");
                Some(result)
            }
            Err(err) => {
                warn!(pr = %pr, %err, "undecodable cache entry, treating as miss");
                None
            }
        }
    }

    /// Store a result under the pull request's fingerprint. Failures are
    /// logged and swallowed.
    pub async fn put(&self, pr: &PullRequestRef, result: &AnalysisResult) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let encoded = match serde_json::to_string(result) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(pr = %pr, %err, "failed to encode result for cache");
                return;
            }
        };
        if let Err(err) = store.set(&Self::key(pr), &encoded, Some(self.ttl)).await {
            warn!(pr = %pr, %err, "failed to store cache entry");
        }
    }

    /// Drop any cached result for the pull request.
    pub async fn invalidate(&self, pr: &PullRequestRef) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if let Err(err) = store.delete(&Self::key(pr)).await {
            warn!(pr = %pr, %err, "failed to invalidate cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::PullRequestSummary;
    use crate::task::MemoryStore;
    use chrono::Utc;

    fn pr() -> PullRequestRef {
        PullRequestRef::parse("acme/widgets", 42).unwrap()
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            pr_summary: PullRequestSummary::default(),
            issues: vec![],
            overall_score: 90,
            summary: "clean".to_string(),
            recommendations: vec![],
            positive_changes: vec![],
            analyzed_at: Utc::now(),
            processing_time_secs: 2.0,
            files_analyzed: 1,
        }
    }

    #[test]
    fn fingerprint_is_stable_and_hex() {
        let a = fingerprint(&pr());
        let b = fingerprint(&pr());
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_distinguishes_prs() {
        let other = PullRequestRef::parse("acme/widgets", 43).unwrap();
        assert_ne!(fingerprint(&pr()), fingerprint(&other));
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = FingerprintCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        assert!(cache.get(&pr()).await.is_none());
        cache.put(&pr(), &result()).await;
        let hit = cache.get(&pr()).await.unwrap();
        assert_eq!(hit.overall_score, 90);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = FingerprintCache::new(Arc::new(MemoryStore::new()), Duration::from_secs(60));
        cache.put(&pr(), &result()).await;
        cache.invalidate(&pr()).await;
        assert!(cache.get(&pr()).await.is_none());
    }

    #[tokio::test]
    async fn disabled_cache_is_a_no_op() {
        let cache = FingerprintCache::disabled();
        cache.put(&pr(), &result()).await;
        assert!(cache.get(&pr()).await.is_none());
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let store = Arc::new(MemoryStore::new());
        let key = format!("cache:pr:{}", fingerprint(&pr()));
        store.set(&key, "{broken", None).await.unwrap();
        let cache = FingerprintCache::new(store, Duration::from_secs(60));
        assert!(cache.get(&pr()).await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_with_ttl() {
        let cache = FingerprintCache::new(Arc::new(MemoryStore::new()), Duration::from_millis(10));
        cache.put(&pr(), &result()).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get(&pr()).await.is_none());
    }
}
