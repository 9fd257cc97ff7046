//! Short-TTL dedup store backed by redis, with a process-local first level.
//!
//! The contract here is strict: membership checks must be exact (no
//! probabilistic structures — a false positive throws away a valuable
//! pick), and writes are awaited before a pick counts as sent.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StoreError;

/// Fixed key the poller cursor is persisted under.
const CURSOR_KEY: &str = "valuecast:cursor";

/// Deadline for a single store round trip.
const OP_TIMEOUT: Duration = Duration::from_millis(100);

/// TTL hint for locally cached hits discovered via the backing store.
const LOCAL_HIT_TTL: Duration = Duration::from_secs(60);

/// Process-local TTL cache in front of the backing store.
///
/// Bounded by entry count; eviction runs inline on insert. This level only
/// ever short-circuits reads — a fresh key's write always reaches redis.
struct LocalCache {
    entries: HashMap<String, Instant>,
    capacity: usize,
}

impl LocalCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    fn contains(&mut self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(expires_at) if *expires_at > Instant::now() => true,
            Some(_) => {
                self.entries.remove(key);
                false
            }
            None => false,
        }
    }

    fn insert(&mut self, key: String, ttl: Duration) {
        if self.entries.len() >= self.capacity {
            self.purge_expired();
        }
        if self.entries.len() >= self.capacity {
            self.evict_soonest(self.capacity / 10 + 1);
        }
        self.entries.insert(key, Instant::now() + ttl);
    }

    fn purge_expired(&mut self) {
        let now = Instant::now();
        self.entries.retain(|_, expires_at| *expires_at > now);
    }

    fn evict_soonest(&mut self, count: usize) {
        let mut by_expiry: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        by_expiry.sort_by_key(|(_, expires_at)| *expires_at);
        for (key, _) in by_expiry.into_iter().take(count) {
            self.entries.remove(&key);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Redis-backed dedup store plus the poller cursor.
pub struct DedupStore {
    conn: ConnectionManager,
    local: Mutex<LocalCache>,
}

impl DedupStore {
    /// Connect with retry; each failed attempt backs off exponentially.
    pub async fn connect(url: &str, max_retries: u32) -> Result<Self, StoreError> {
        let mut attempt = 0;
        let conn = loop {
            match redis::Client::open(url) {
                Ok(client) => match ConnectionManager::new(client).await {
                    Ok(conn) => {
                        info!("Connected to dedup store");
                        break conn;
                    }
                    Err(e) => {
                        attempt += 1;
                        if attempt >= max_retries {
                            return Err(StoreError::Redis(e));
                        }
                        warn!(attempt, error = %e, "Dedup store connection failed, retrying");
                        tokio::time::sleep(Duration::from_secs(2u64.pow(attempt))).await;
                    }
                },
                Err(e) => return Err(StoreError::Redis(e)),
            }
        };

        Ok(Self {
            conn,
            local: Mutex::new(LocalCache::new(2000)),
        })
    }

    /// Batched membership query: true when any key is present.
    pub async fn exists_any(&self, keys: &[String]) -> Result<bool, StoreError> {
        Ok(self.exists_which(keys).await?.is_some())
    }

    /// Batched membership query returning the index of the first present
    /// key, or `None` when all are absent.
    ///
    /// Local level first, then one pipelined round trip. Backing-store hits
    /// backfill the local level.
    pub async fn exists_which(&self, keys: &[String]) -> Result<Option<usize>, StoreError> {
        if keys.is_empty() {
            return Ok(None);
        }

        {
            let mut local = self.local.lock().await;
            if let Some(index) = keys.iter().position(|key| local.contains(key)) {
                return Ok(Some(index));
            }
        }

        let mut pipe = redis::pipe();
        for key in keys {
            pipe.exists(key);
        }

        let mut conn = self.conn.clone();
        let hits: Vec<bool> = tokio::time::timeout(OP_TIMEOUT, pipe.query_async(&mut conn))
            .await
            .map_err(|_| StoreError::Timeout)??;

        let mut first = None;
        let mut local = self.local.lock().await;
        for (index, (key, hit)) in keys.iter().zip(hits).enumerate() {
            if hit {
                local.insert(key.clone(), LOCAL_HIT_TTL);
                first.get_or_insert(index);
            }
        }
        Ok(first)
    }

    /// Write keys with their TTLs in one pipelined round trip.
    ///
    /// Awaited by design: callers must not treat a pick as sent until this
    /// returns. The local level is only updated after the store accepted
    /// the write.
    pub async fn record_batch(&self, entries: &[(String, u64)]) -> Result<(), StoreError> {
        if entries.is_empty() {
            return Ok(());
        }

        let stamp = OffsetDateTime::now_utc().unix_timestamp();
        let mut pipe = redis::pipe();
        for (key, ttl) in entries {
            pipe.set_ex(key, stamp, *ttl).ignore();
        }

        let mut conn = self.conn.clone();
        tokio::time::timeout(OP_TIMEOUT, pipe.query_async::<()>(&mut conn))
            .await
            .map_err(|_| StoreError::Timeout)??;

        let mut local = self.local.lock().await;
        for (key, ttl) in entries {
            local.insert(key.clone(), Duration::from_secs(*ttl));
        }
        Ok(())
    }

    /// Persist the poller cursor.
    pub async fn save_cursor(&self, cursor: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        tokio::time::timeout(
            OP_TIMEOUT,
            redis::cmd("SET")
                .arg(CURSOR_KEY)
                .arg(cursor)
                .query_async::<()>(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(())
    }

    /// Load the persisted poller cursor, if any.
    pub async fn load_cursor(&self) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let cursor: Option<String> = tokio::time::timeout(
            OP_TIMEOUT,
            redis::cmd("GET").arg(CURSOR_KEY).query_async(&mut conn),
        )
        .await
        .map_err(|_| StoreError::Timeout)??;
        Ok(cursor)
    }
}
