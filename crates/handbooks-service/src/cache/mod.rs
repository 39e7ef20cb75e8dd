//! Token liveness cache.
//!
//! A token is live while `<kind>_hash:<sha256-hex(token)>` exists. Entries
//! hold the marker `"valid"` and expire with the token. Deleting the key
//! revokes the token even though its signature still verifies.
//!
//! # Key Patterns
//!
//! - `access_hash:{sha256}` - live access token
//! - `refresh_hash:{sha256}` - live refresh token

use async_trait::async_trait;
use common::jwt::TokenKind;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::{error, instrument, warn};

use crate::observability::metrics::record_cache_operation;

/// Value stored for every live token.
pub const VALID_MARKER: &str = "valid";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Token cache unavailable: {0}")]
    Unavailable(String),

    #[error("Token cache command failed: {0}")]
    Command(String),
}

/// Cache key for a token of the given kind.
///
/// Only the SHA-256 of the token is stored, so a dump of the cache does not
/// hand out usable bearer tokens.
pub fn token_key(kind: TokenKind, token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("{}:{}", kind.cache_prefix(), hex::encode(digest))
}

/// Narrow capability over the liveness store.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Mark a key live for `ttl`.
    async fn store(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Whether a key is currently live.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Delete a key. Returns `true` only for the caller that removed it.
    async fn remove(&self, key: &str) -> Result<bool, CacheError>;

    /// Connectivity check for health probes.
    async fn ping(&self) -> Result<(), CacheError>;
}

/// Redis-backed token cache.
///
/// The `MultiplexedConnection` is cheap to clone and safe for concurrent
/// use, so each operation clones it instead of locking.
#[derive(Clone)]
pub struct RedisTokenCache {
    connection: MultiplexedConnection,
}

impl RedisTokenCache {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Do not log redis_url, it may carry credentials
            error!(target: "hb.cache", error = %e, "Failed to open Redis client");
            CacheError::Unavailable(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "hb.cache", error = %e, "Failed to connect to Redis");
                CacheError::Unavailable(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }
}

#[async_trait]
impl TokenCache for RedisTokenCache {
    #[instrument(skip_all, fields(ttl_secs = ttl.as_secs()))]
    async fn store(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let result: Result<(), _> = conn.set_ex(key, VALID_MARKER, ttl.as_secs()).await;

        match result {
            Ok(()) => {
                record_cache_operation("store", "success");
                Ok(())
            }
            Err(e) => {
                warn!(target: "hb.cache", error = %e, "Failed to store token entry");
                record_cache_operation("store", "error");
                Err(CacheError::Command(format!("Failed to store token entry: {e}")))
            }
        }
    }

    #[instrument(skip_all)]
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let result: Result<bool, _> = conn.exists(key).await;

        match result {
            Ok(found) => {
                record_cache_operation("exists", "success");
                Ok(found)
            }
            Err(e) => {
                warn!(target: "hb.cache", error = %e, "Failed to check token entry");
                record_cache_operation("exists", "error");
                Err(CacheError::Command(format!("Failed to check token entry: {e}")))
            }
        }
    }

    #[instrument(skip_all)]
    async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        let result: Result<u64, _> = conn.del(key).await;

        match result {
            Ok(removed) => {
                record_cache_operation("remove", "success");
                Ok(removed > 0)
            }
            Err(e) => {
                warn!(target: "hb.cache", error = %e, "Failed to remove token entry");
                record_cache_operation("remove", "error");
                Err(CacheError::Command(format!("Failed to remove token entry: {e}")))
            }
        }
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::Unavailable(format!("Redis ping failed: {e}")))?;
        Ok(())
    }
}

/// In-memory token cache for tests.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Mutex;
    use tokio::time::Instant;

    const UNLIMITED_STORES: usize = usize::MAX;

    /// Mock cache with TTL expiry and failure injection.
    ///
    /// `remove` is atomic under the lock, which mirrors Redis `DEL`
    /// returning the count only to the caller that deleted the key.
    pub struct MemoryTokenCache {
        entries: Mutex<HashMap<String, (Instant, Duration)>>,
        failing: AtomicBool,
        store_budget: AtomicUsize,
    }

    impl Default for MemoryTokenCache {
        fn default() -> Self {
            Self {
                entries: Mutex::new(HashMap::new()),
                failing: AtomicBool::new(false),
                store_budget: AtomicUsize::new(UNLIMITED_STORES),
            }
        }
    }

    impl MemoryTokenCache {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent operation fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Let the next `n` stores succeed and fail every store after them.
        /// Other operations are unaffected.
        pub fn fail_store_after(&self, n: usize) {
            self.store_budget.store(n, Ordering::SeqCst);
        }

        /// Lift a limit set by [`fail_store_after`](Self::fail_store_after).
        pub fn reset_store_budget(&self) {
            self.store_budget.store(UNLIMITED_STORES, Ordering::SeqCst);
        }

        /// TTL the key was stored with, if it is live.
        pub async fn ttl_of(&self, key: &str) -> Option<Duration> {
            let entries = self.entries.lock().await;
            entries
                .get(key)
                .filter(|(stored_at, ttl)| stored_at.elapsed() < *ttl)
                .map(|(_, ttl)| *ttl)
        }

        /// Number of live entries whose key starts with `prefix`.
        pub async fn count_with_prefix(&self, prefix: &str) -> usize {
            let entries = self.entries.lock().await;
            entries
                .iter()
                .filter(|(key, (stored_at, ttl))| {
                    key.starts_with(prefix) && stored_at.elapsed() < *ttl
                })
                .count()
        }

        fn check_failing(&self) -> Result<(), CacheError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable(
                    "Mock token cache is failing".to_string(),
                ));
            }
            Ok(())
        }

        fn take_store_budget(&self) -> Result<(), CacheError> {
            self.store_budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |budget| {
                    if budget == UNLIMITED_STORES {
                        Some(budget)
                    } else {
                        budget.checked_sub(1)
                    }
                })
                .map(|_| ())
                .map_err(|_| CacheError::Command("Mock token cache store budget exhausted".to_string()))
        }
    }

    #[async_trait]
    impl TokenCache for MemoryTokenCache {
        async fn store(&self, key: &str, ttl: Duration) -> Result<(), CacheError> {
            self.check_failing()?;
            self.take_store_budget()?;
            let mut entries = self.entries.lock().await;
            entries.insert(key.to_string(), (Instant::now(), ttl));
            Ok(())
        }

        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            self.check_failing()?;
            let entries = self.entries.lock().await;
            Ok(entries
                .get(key)
                .is_some_and(|(stored_at, ttl)| stored_at.elapsed() < *ttl))
        }

        async fn remove(&self, key: &str) -> Result<bool, CacheError> {
            self.check_failing()?;
            let mut entries = self.entries.lock().await;
            Ok(entries
                .remove(key)
                .is_some_and(|(stored_at, ttl)| stored_at.elapsed() < ttl))
        }

        async fn ping(&self) -> Result<(), CacheError> {
            self.check_failing()
        }
    }
}
