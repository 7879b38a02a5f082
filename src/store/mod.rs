pub mod redis;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use self::redis::RedisStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache store error: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("Cache store did not answer within {0:?}")]
    Timeout(Duration),
}

/// Result of a read that reached the store. A miss is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLookup {
    Hit(String),
    Miss,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<StoreLookup, StoreError>;

    /// Unconditionally overwrites `key` and restarts its expiry.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
