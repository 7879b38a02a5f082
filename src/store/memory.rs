use super::{CacheStore, StoreError, StoreLookup};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// In-process store with Redis-like expiry, driven by the tokio clock so
/// tests can pause and advance time.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, key: &str, value: &str, ttl: Duration) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<StoreLookup, StoreError> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => {
                return Ok(StoreLookup::Hit(value.clone()));
            }
            Some(_) => {}
            None => return Ok(StoreLookup::Miss),
        }

        entries.remove(key);
        Ok(StoreLookup::Miss)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.insert(key, value, ttl).await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let store = MemoryStore::new();
        store.set("paris", "{}", DAY).await.unwrap();

        tokio::time::advance(DAY - Duration::from_secs(60)).await;
        assert_eq!(store.get("paris").await.unwrap(), StoreLookup::Hit("{}".to_string()));

        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(store.get("paris").await.unwrap(), StoreLookup::Miss);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_resets_expiry() {
        let store = MemoryStore::new();
        store.set("paris", "old", DAY).await.unwrap();

        tokio::time::advance(DAY / 2).await;
        store.set("paris", "new", DAY).await.unwrap();

        tokio::time::advance(DAY - Duration::from_secs(1)).await;
        assert_eq!(store.get("paris").await.unwrap(), StoreLookup::Hit("new".to_string()));
        assert_eq!(store.writes(), 2);
    }
}
