//! Process-local [`ResponseCache`] implementation.
//!
//! Entries are keyed by `(fingerprint, provider, user)` and never expire;
//! deployments that need retention plug in their own store through the port.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use domain::{CacheEntry, CacheError, ProviderId, QueryFingerprint, ResponseCache, UserId};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

type CacheKey = (QueryFingerprint, ProviderId, UserId);

/// Hit/miss counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// In-memory response cache behind an async read/write lock.
#[derive(Debug, Default)]
pub struct InMemoryResponseCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryResponseCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns `true` if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Current counters.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn lookup(
        &self,
        fingerprint: &QueryFingerprint,
        provider_id: &ProviderId,
        user_id: &UserId,
    ) -> Result<Option<String>, CacheError> {
        let key = (fingerprint.clone(), provider_id.clone(), user_id.clone());
        let found = self.entries.read().await.get(&key).map(|e| e.text.clone());

        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(provider = %provider_id, "Cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(provider = %provider_id, "Cache miss");
        }
        Ok(found)
    }

    async fn store(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let key = (
            entry.fingerprint.clone(),
            entry.provider_id.clone(),
            entry.user_id.clone(),
        );
        // First write wins; entries are immutable once stored.
        self.entries.write().await.entry(key).or_insert(entry);
        Ok(())
    }
}
