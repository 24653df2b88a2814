//! First-page feed cache ("feed stickiness")
//!
//! Repeated cursorless feed loads within a short TTL return the exact same
//! page instead of a freshly re-ranked one. Deeper pages are never cached.
//!
//! Storage is pluggable:
//! - `InMemoryFeedStore`: process-local `DashMap`, expired entries removed on
//!   read and by the background sweeper
//! - `RedisFeedStore`: `SETEX` with the TTL, so Redis expires entries itself
//!
//! Expiry is always re-checked against the injected clock on read. Every
//! store call is bounded by `op_timeout`; a stalled backend reads as a miss
//! and loses the write.
//!
//! Keys: `feed:{user_id}:{feed_type}:{cursor}:{limit}`

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{FeedPage, FeedType};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeedCacheKey {
    pub user_id: Uuid,
    pub feed_type: FeedType,
    pub cursor: String,
    pub limit: usize,
}

impl FeedCacheKey {
    /// Key of a cursorless request, the only kind the assembler caches.
    pub fn first_page(user_id: Uuid, feed_type: FeedType, limit: usize) -> Self {
        Self {
            user_id,
            feed_type,
            cursor: String::new(),
            limit,
        }
    }

    pub fn storage_key(&self) -> String {
        format!(
            "feed:{}:{}:{}:{}",
            self.user_id,
            self.feed_type.as_str(),
            self.cursor,
            self.limit
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedCacheEntry {
    pub page: FeedPage,
    pub expires_at: DateTime<Utc>,
}

impl FeedCacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[async_trait]
pub trait FeedCacheStore: Send + Sync {
    async fn load(&self, key: &FeedCacheKey) -> Result<Option<FeedCacheEntry>>;

    async fn store(&self, key: &FeedCacheKey, entry: FeedCacheEntry, ttl: Duration) -> Result<()>;

    async fn remove(&self, key: &FeedCacheKey) -> Result<()>;

    /// Remove entries expired at `now`. Stores with native expiry return 0.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[derive(Default)]
pub struct InMemoryFeedStore {
    entries: DashMap<FeedCacheKey, FeedCacheEntry>,
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl FeedCacheStore for InMemoryFeedStore {
    async fn load(&self, key: &FeedCacheKey) -> Result<Option<FeedCacheEntry>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn store(&self, key: &FeedCacheKey, entry: FeedCacheEntry, _ttl: Duration) -> Result<()> {
        self.entries.insert(key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &FeedCacheKey) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok(before.saturating_sub(self.entries.len()))
    }
}

/// Redis-backed store; entries expire server-side through `SETEX`.
#[derive(Clone)]
pub struct RedisFeedStore {
    client: Arc<ConnectionManager>,
}

impl RedisFeedStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Cache(format!("Failed to create Redis client: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to create Redis connection: {}", e)))?;

        Ok(Self {
            client: Arc::new(manager),
        })
    }

    /// Keep the multiplexed connection warm.
    pub async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                AppError::Cache(format!("Redis health check failed: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl FeedCacheStore for RedisFeedStore {
    async fn load(&self, key: &FeedCacheKey) -> Result<Option<FeedCacheEntry>> {
        let storage_key = key.storage_key();

        let value: Option<String> = redis::cmd("GET")
            .arg(&storage_key)
            .query_async(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis GET failed for {}: {}", storage_key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        match value {
            Some(json) => {
                let entry = serde_json::from_str::<FeedCacheEntry>(&json).map_err(|e| {
                    AppError::Cache(format!("Cache deserialization failed: {}", e))
                })?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn store(&self, key: &FeedCacheKey, entry: FeedCacheEntry, ttl: Duration) -> Result<()> {
        let storage_key = key.storage_key();
        let json = serde_json::to_string(&entry)
            .map_err(|e| AppError::Cache(format!("Cache serialization failed: {}", e)))?;
        let ttl_secs = ttl.num_seconds().max(1);

        redis::cmd("SETEX")
            .arg(&storage_key)
            .arg(ttl_secs)
            .arg(&json)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis SETEX failed for {}: {}", storage_key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        Ok(())
    }

    async fn remove(&self, key: &FeedCacheKey) -> Result<()> {
        redis::cmd("DEL")
            .arg(key.storage_key())
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
        Ok(0)
    }
}

const DEFAULT_OP_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(250);

/// TTL-enforcing facade over a `FeedCacheStore`.
///
/// Storage failures never fail a feed request: reads degrade to a miss and
/// writes are dropped, both with a warning.
#[derive(Clone)]
pub struct FeedCache {
    store: Arc<dyn FeedCacheStore>,
    clock: Arc<dyn Clock>,
    op_timeout: std::time::Duration,
}

impl FeedCache {
    pub fn new(store: Arc<dyn FeedCacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Bound each store call to `op_timeout`.
    pub fn with_op_timeout(mut self, op_timeout: std::time::Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn op_timeout(&self) -> std::time::Duration {
        self.op_timeout
    }

    async fn bounded<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Cache(format!(
                "{} timed out after {}ms",
                op,
                self.op_timeout.as_millis()
            ))),
        }
    }

    pub async fn get(&self, key: &FeedCacheKey) -> Option<FeedPage> {
        let now = self.clock.now();
        match self.bounded("load", self.store.load(key)).await {
            Ok(Some(entry)) if !entry.is_expired(now) => {
                metrics::record_cache_lookup("hit");
                debug!(key = %key.storage_key(), "Feed cache hit");
                Some(entry.page)
            }
            Ok(Some(_)) => {
                metrics::record_cache_lookup("expired");
                debug!(key = %key.storage_key(), "Feed cache entry expired");
                if let Err(e) = self.bounded("remove", self.store.remove(key)).await {
                    warn!(error = %e, "Failed to evict expired feed cache entry");
                }
                None
            }
            Ok(None) => {
                metrics::record_cache_lookup("miss");
                debug!(key = %key.storage_key(), "Feed cache miss");
                None
            }
            Err(e) => {
                metrics::record_cache_lookup("error");
                warn!(error = %e, "Feed cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store `page` for `ttl`. A non-positive TTL disables caching.
    pub async fn set(&self, key: &FeedCacheKey, page: FeedPage, ttl: Duration) {
        if ttl <= Duration::zero() {
            return;
        }

        let entry = FeedCacheEntry {
            page,
            expires_at: self.clock.now() + ttl,
        };

        match self.bounded("store", self.store.store(key, entry, ttl)).await {
            Ok(()) => debug!(
                key = %key.storage_key(),
                ttl_secs = ttl.num_seconds(),
                "Cached feed page"
            ),
            Err(e) => warn!(error = %e, "Feed cache write failed"),
        }
    }

    /// Remove expired entries from stores without native expiry.
    pub async fn sweep(&self) -> Result<usize> {
        self.store.purge_expired(self.clock.now()).await
    }
}

/// Store whose every call hangs, standing in for an unresponsive Redis.
#[cfg(test)]
pub(crate) struct StalledFeedStore;

#[cfg(test)]
#[async_trait]
impl FeedCacheStore for StalledFeedStore {
    async fn load(&self, _key: &FeedCacheKey) -> Result<Option<FeedCacheEntry>> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(None)
    }

    async fn store(&self, _key: &FeedCacheKey, _entry: FeedCacheEntry, _ttl: Duration) -> Result<()> {
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
        Ok(())
    }

    async fn remove(&self, _key: &FeedCacheKey) -> Result<()> {
        Ok(())
    }

    async fn purge_expired(&self, _now: DateTime<Utc>) -> Result<usize> {
        Ok(0)
    }
}
