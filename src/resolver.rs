//! Cache-aside lookup: check the store, fall back to the origin on a miss,
//! write the fetched record back.
//!
//! Store failures are soft. A store that errors or times out on read is
//! treated as a miss, and a failed write-back is logged and skipped. Origin
//! failures are hard and become the request's outcome.

use crate::key::LookupKey;
use crate::store::{CacheStore, StoreError, StoreLookup};
use crate::weather::{OriginError, OriginFetcher};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How a lookup ended. The payload is the serialized weather record, byte
/// for byte what the store holds.
#[derive(Debug)]
pub enum FetchOutcome {
    HitCache(String),
    FetchedFromOrigin(String),
    Failed(OriginError),
}

impl FetchOutcome {
    pub fn source(&self) -> &'static str {
        match self {
            FetchOutcome::HitCache(_) => "cache",
            FetchOutcome::FetchedFromOrigin(_) => "origin",
            FetchOutcome::Failed(_) => "none",
        }
    }

    pub fn into_result(self) -> Result<String, OriginError> {
        match self {
            FetchOutcome::HitCache(body) | FetchOutcome::FetchedFromOrigin(body) => Ok(body),
            FetchOutcome::Failed(e) => Err(e),
        }
    }
}

#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    origin_fetches: AtomicU64,
    origin_failures: AtomicU64,
    store_read_errors: AtomicU64,
    store_write_errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStatsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub origin_fetches: u64,
    pub origin_failures: u64,
    pub store_read_errors: u64,
    pub store_write_errors: u64,
}

impl CacheStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            origin_fetches: self.origin_fetches.load(Ordering::Relaxed),
            origin_failures: self.origin_failures.load(Ordering::Relaxed),
            store_read_errors: self.store_read_errors.load(Ordering::Relaxed),
            store_write_errors: self.store_write_errors.load(Ordering::Relaxed),
        }
    }
}

pub struct CacheAside {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn OriginFetcher>,
    ttl: Duration,
    store_timeout: Duration,
    stats: CacheStats,
}

impl CacheAside {
    pub fn new(
        store: Arc<dyn CacheStore>,
        origin: Arc<dyn OriginFetcher>,
        ttl: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            origin,
            ttl,
            store_timeout,
            stats: CacheStats::default(),
        }
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }

    /// Whether the store currently answers a ping within the store timeout.
    pub async fn store_healthy(&self) -> bool {
        match self.bounded(self.store.ping()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Cache store health check failed");
                false
            }
        }
    }

    pub async fn resolve(&self, raw: &str) -> FetchOutcome {
        let key = match LookupKey::parse(raw) {
            Ok(key) => key,
            Err(e) => return FetchOutcome::Failed(e),
        };

        match self.bounded(self.store.get(key.cache_key())).await {
            Ok(StoreLookup::Hit(body)) => {
                CacheStats::bump(&self.stats.hits);
                tracing::debug!(key = %key, source = "cache", "Cache hit");
                return FetchOutcome::HitCache(body);
            }
            Ok(StoreLookup::Miss) => {
                CacheStats::bump(&self.stats.misses);
                tracing::debug!(key = %key, "Cache miss");
            }
            Err(e) => {
                CacheStats::bump(&self.stats.store_read_errors);
                tracing::warn!(key = %key, error = %e, "Cache read failed, fetching from origin");
            }
        }

        CacheStats::bump(&self.stats.origin_fetches);
        let record = match self.origin.fetch(key.original()).await {
            Ok(record) => record,
            Err(e) => {
                CacheStats::bump(&self.stats.origin_failures);
                tracing::warn!(key = %key, error = %e, "Origin fetch failed");
                return FetchOutcome::Failed(e);
            }
        };

        let body = match serde_json::to_string(&record) {
            Ok(body) => body,
            Err(e) => return FetchOutcome::Failed(OriginError::Decode(e)),
        };

        if let Err(e) = self
            .bounded(self.store.set(key.cache_key(), &body, self.ttl))
            .await
        {
            CacheStats::bump(&self.stats.store_write_errors);
            tracing::warn!(key = %key, error = %e, "Cache write-back failed, serving origin data");
        } else {
            tracing::info!(key = %key, source = "origin", ttl_secs = self.ttl.as_secs(), "Cached weather");
        }

        FetchOutcome::FetchedFromOrigin(body)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .unwrap_or(Err(StoreError::Timeout(self.store_timeout)))
    }
}
