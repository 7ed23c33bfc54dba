use std::collections::HashMap;

use redis::aio::{ConnectionManager, PubSub};
use redis::AsyncCommands;

use vigil_core::error::VigilError;

fn coord_err(e: redis::RedisError) -> VigilError {
    VigilError::Coord(e.to_string())
}

/// Shared handle to the coordination store.
///
/// Wraps a multiplexed `ConnectionManager` (auto-reconnecting, cheap to
/// clone) plus the underlying client for dedicated pub/sub connections.
/// Every command is a suspension point; request-scoped cancellation simply
/// drops the in-flight future.
#[derive(Clone)]
pub struct CoordClient {
    client: redis::Client,
    manager: ConnectionManager,
}

impl CoordClient {
    /// Connect eagerly so a bad URL fails at startup, not first use.
    pub async fn connect(url: &str) -> Result<Self, VigilError> {
        let client = redis::Client::open(url).map_err(coord_err)?;
        let manager = ConnectionManager::new(client.clone()).await.map_err(coord_err)?;
        Ok(Self { client, manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }

    // ── Strings / TTLs ───────────────────────────────────────────────────────

    pub async fn get(&self, key: &str) -> Result<Option<String>, VigilError> {
        self.conn().get(key).await.map_err(coord_err)
    }

    pub async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), VigilError> {
        self.conn().set_ex(key, value, ttl_secs).await.map_err(coord_err)
    }

    /// Remaining TTL in seconds: -2 when the key is absent, -1 when it has
    /// no expiry.
    pub async fn ttl_secs(&self, key: &str) -> Result<i64, VigilError> {
        self.conn().ttl(key).await.map_err(coord_err)
    }

    /// Delete a key and return how many keys were removed. Redis executes
    /// DEL atomically, so a count of 1 proves this caller won any race.
    pub async fn del_count(&self, key: &str) -> Result<i64, VigilError> {
        self.conn().del(key).await.map_err(coord_err)
    }

    pub async fn exists(&self, key: &str) -> Result<bool, VigilError> {
        self.conn().exists(key).await.map_err(coord_err)
    }

    // ── Counters ─────────────────────────────────────────────────────────────

    pub async fn incr(&self, key: &str) -> Result<i64, VigilError> {
        self.conn().incr(key, 1).await.map_err(coord_err)
    }

    pub async fn expire(&self, key: &str, ttl_secs: i64) -> Result<(), VigilError> {
        let _: bool = self.conn().expire(key, ttl_secs).await.map_err(coord_err)?;
        Ok(())
    }

    /// INCR-then-EXPIRE-if-first counter. Returns the post-increment count;
    /// the caller compares against its ceiling.
    pub async fn bump_counter(&self, key: &str, window_secs: i64) -> Result<i64, VigilError> {
        let count = self.incr(key).await?;
        if count == 1 {
            self.expire(key, window_secs).await?;
        }
        Ok(count)
    }

    // ── Hashes ───────────────────────────────────────────────────────────────

    pub async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, VigilError> {
        self.conn().hgetall(key).await.map_err(coord_err)
    }

    pub async fn hset_all(&self, key: &str, fields: &[(&str, String)]) -> Result<(), VigilError> {
        self.conn().hset_multiple(key, fields).await.map_err(coord_err)
    }

    // ── Lists ────────────────────────────────────────────────────────────────

    pub async fn lpush(&self, key: &str, value: &str) -> Result<(), VigilError> {
        let _: i64 = self.conn().lpush(key, value).await.map_err(coord_err)?;
        Ok(())
    }

    pub async fn rpush(&self, key: &str, value: &str) -> Result<(), VigilError> {
        let _: i64 = self.conn().rpush(key, value).await.map_err(coord_err)?;
        Ok(())
    }

    pub async fn ltrim(&self, key: &str, start: isize, stop: isize) -> Result<(), VigilError> {
        self.conn().ltrim(key, start, stop).await.map_err(coord_err)
    }

    pub async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>, VigilError> {
        self.conn().lrange(key, start, stop).await.map_err(coord_err)
    }

    pub async fn llen(&self, key: &str) -> Result<i64, VigilError> {
        self.conn().llen(key).await.map_err(coord_err)
    }

    /// Blocking pop with a timeout; `None` when the timeout elapses empty.
    pub async fn blpop(&self, key: &str, timeout_secs: f64) -> Result<Option<String>, VigilError> {
        let popped: Option<(String, String)> =
            self.conn().blpop(key, timeout_secs).await.map_err(coord_err)?;
        Ok(popped.map(|(_, value)| value))
    }

    // ── Pattern delete ───────────────────────────────────────────────────────

    /// SCAN-and-delete every key matching `pattern`. Returns the number of
    /// keys removed.
    pub async fn scan_delete(&self, pattern: &str) -> Result<u64, VigilError> {
        let mut conn = self.conn();
        let keys: Vec<String> = {
            let mut iter = conn.scan_match::<_, String>(pattern).await.map_err(coord_err)?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };
        if keys.is_empty() {
            return Ok(0);
        }
        self.conn().del(keys).await.map_err(coord_err)
    }

    // ── Pub/sub ──────────────────────────────────────────────────────────────

    pub async fn publish(&self, channel: &str, message: &str) -> Result<(), VigilError> {
        let _: i64 = self.conn().publish(channel, message).await.map_err(coord_err)?;
        Ok(())
    }

    /// Dedicated pub/sub connection. The caller owns its lifecycle and must
    /// unsubscribe before dropping it.
    pub async fn pubsub(&self) -> Result<PubSub, VigilError> {
        self.client.get_async_pubsub().await.map_err(coord_err)
    }
}
