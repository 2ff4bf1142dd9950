//! Process-local TTL caches for rate maps and upstream failures.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tickerfeed_common::{Currency, Timestamp};
use tracing::debug;

use crate::sanitize::RateMap;

/// Prefix shared by every ticker cache key.
pub const CURRENT_TICKER_PREFIX: &str = "current-ticker";

/// Errors returned by a cache service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Key absent or expired.
    #[error("Cache key not found: {0}")]
    NotFound(String),

    /// Backing store failure.
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Key/value store with per-entry TTL.
///
/// Implementations must report an expired entry exactly like an absent one.
#[async_trait]
pub trait CacheService<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V, CacheError>;

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Thread-safe in-memory cache. Expired entries are dropped lazily on read.
pub struct LocalCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
}

impl<V: Clone> LocalCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn evict_expired(&self) {
        self.entries.retain(|_, entry| entry.is_valid());
    }

    fn read(&self, key: &str) -> Option<V> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_valid() {
                debug!(key, "Cache hit");
                return Some(entry.value.clone());
            }
            debug!(key, "Cache entry expired");
            drop(entry);
            self.entries.remove_if(key, |_, entry| !entry.is_valid());
        }

        debug!(key, "Cache miss");
        None
    }
}

impl<V: Clone> Default for LocalCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> CacheService<V> for LocalCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<V, CacheError> {
        self.read(key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    async fn set(&self, key: &str, value: V, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .insert(key.to_string(), CacheEntry::new(value, ttl));
        Ok(())
    }
}

/// Last observed upstream failure for one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureStatus {
    /// HTTP status code, always >= 400.
    pub status: u16,
    pub recorded_at: Timestamp,
}

impl FailureStatus {
    /// Build a failure record; `None` for statuses below 400.
    pub fn new(status: u16) -> Option<Self> {
        (status >= 400).then(|| Self {
            status,
            recorded_at: tickerfeed_common::now(),
        })
    }
}

/// Cache keys owned by one coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    /// Rate map key. The quote currency is left out so one upstream call
    /// serves every quote for the same base.
    pub rates: String,
    /// Negative-result key.
    pub status: String,
}

impl CacheKeys {
    pub fn new(exchange: &str, base: &Currency) -> Self {
        let rates = format!("{}:{}:{}", CURRENT_TICKER_PREFIX, exchange, base.code());
        let status = format!("{}:status", rates);
        Self { rates, status }
    }
}

/// The Rate Cache and Negative-Result Cache shared by every coordinator.
///
/// Created once at process start and handed to each coordinator.
#[derive(Clone)]
pub struct ExchangeCaches {
    pub rates: Arc<dyn CacheService<RateMap>>,
    pub failures: Arc<dyn CacheService<FailureStatus>>,
}

impl ExchangeCaches {
    pub fn new(
        rates: Arc<dyn CacheService<RateMap>>,
        failures: Arc<dyn CacheService<FailureStatus>>,
    ) -> Self {
        Self { rates, failures }
    }

    /// Both caches backed by [`LocalCache`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(LocalCache::new()), Arc::new(LocalCache::new()))
    }

    /// Cached rate map, treating any cache error as a miss.
    pub async fn cached_rates(&self, keys: &CacheKeys) -> Option<RateMap> {
        self.rates.get(&keys.rates).await.ok()
    }

    /// Last recorded failure, treating any cache error as "no known failure".
    pub async fn last_failure(&self, keys: &CacheKeys) -> Option<FailureStatus> {
        self.failures
            .get(&keys.status)
            .await
            .ok()
            .filter(|failure| failure.status >= 400)
    }

    pub async fn store_rates(
        &self,
        keys: &CacheKeys,
        rates: RateMap,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.rates.set(&keys.rates, rates, ttl).await
    }

    /// Remember an upstream failure. Statuses below 400 are ignored and
    /// `Ok(false)` is returned.
    pub async fn record_failure(
        &self,
        keys: &CacheKeys,
        status: u16,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        match FailureStatus::new(status) {
            Some(failure) => {
                self.failures.set(&keys.status, failure, ttl).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn rates() -> RateMap {
        [("EUR".to_string(), 0.92), ("COP".to_string(), 3940.15)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_cache_set_and_get() {
        let cache: LocalCache<RateMap> = LocalCache::new();
        tokio_test::block_on(async {
            cache.set("k", rates(), Duration::from_secs(60)).await.unwrap();
            assert_eq!(cache.get("k").await.unwrap(), rates());
        });
    }

    #[test]
    fn test_cache_miss() {
        let cache: LocalCache<RateMap> = LocalCache::new();
        let result = tokio_test::block_on(cache.get("missing"));
        assert_eq!(result, Err(CacheError::NotFound("missing".to_string())));
    }

    #[test]
    fn test_cache_expiry() {
        let cache: LocalCache<u16> = LocalCache::new();
        tokio_test::block_on(cache.set("k", 7u16, Duration::from_millis(50))).unwrap();

        assert!(tokio_test::block_on(cache.get("k")).is_ok());

        sleep(Duration::from_millis(60));

        assert!(tokio_test::block_on(cache.get("k")).is_err());
        // Expired entry was dropped on read
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_expired() {
        let cache: LocalCache<u16> = LocalCache::new();
        tokio_test::block_on(async {
            cache.set("short", 1u16, Duration::from_millis(10)).await.unwrap();
            cache.set("long", 2u16, Duration::from_secs(60)).await.unwrap();
        });

        sleep(Duration::from_millis(20));
        cache.evict_expired();

        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_keys() {
        let keys = CacheKeys::new("openexchangerates", &Currency::new("usd"));
        assert_eq!(keys.rates, "current-ticker:openexchangerates:USD");
        assert_eq!(keys.status, "current-ticker:openexchangerates:USD:status");
    }

    #[tokio::test]
    async fn test_record_failure_ignores_success_statuses() {
        let caches = ExchangeCaches::in_memory();
        let keys = CacheKeys::new("yadio", &Currency::usd());
        let ttl = Duration::from_secs(60);

        assert!(!caches.record_failure(&keys, 200, ttl).await.unwrap());
        assert!(caches.last_failure(&keys).await.is_none());

        assert!(caches.record_failure(&keys, 429, ttl).await.unwrap());
        assert_eq!(caches.last_failure(&keys).await.unwrap().status, 429);
    }

    #[tokio::test]
    async fn test_caches_are_keyed_per_exchange() {
        let caches = ExchangeCaches::in_memory();
        let oxr = CacheKeys::new("openexchangerates", &Currency::usd());
        let beacon = CacheKeys::new("currencybeacon", &Currency::usd());

        caches
            .store_rates(&oxr, rates(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(caches.cached_rates(&oxr).await, Some(rates()));
        assert!(caches.cached_rates(&beacon).await.is_none());
    }

    #[test]
    fn test_failure_status_threshold() {
        assert!(FailureStatus::new(399).is_none());
        assert_eq!(FailureStatus::new(500).unwrap().status, 500);
    }
}
