use super::{CacheStore, StoreError, StoreLookup};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

/// Redis-backed store. The connection manager is cloned per call and
/// reconnects on its own after the initial connection succeeds.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connects and pings once. Fails if the server is not reachable.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;

        // The manager retries its first connection with backoff; probe with a
        // plain connection so an unreachable server fails startup right away.
        let mut probe = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut probe).await?;

        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }
}

/// Redis rejects `EX 0`, so sub-second TTLs round up to one second.
fn expiry_seconds(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<StoreLookup, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(match value {
            Some(value) => StoreLookup::Hit(value),
            None => StoreLookup::Miss,
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(expiry_seconds(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
