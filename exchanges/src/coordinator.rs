//! Fetch-through-cache coordinator shared by every exchange adapter.
//!
//! One [`FetchCoordinator`] exists per configured exchange and currency pair.
//! Every `fetch_ticker` call runs under that coordinator's own mutex, so at
//! most one upstream request is in flight per instance. Callers queued behind
//! a fetch re-check the cache once they get the lock and normally find it
//! freshly populated.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::RwLock;
use tickerfeed_common::{now, CurrencyPair, InvalidTickerError, Ticker, Timestamp};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::cache::{CacheKeys, ExchangeCaches};
use crate::config::ExchangeConfig;
use crate::error::{ExchangeError, ExchangeResult};
use crate::providers::{ObservedAt, ProviderPayload, RateSource};
use crate::sanitize::{sanitize, RateMap};
use crate::upstream::{UpstreamClient, UpstreamResponse};

/// A source of tickers for one fixed exchange and pair.
#[async_trait]
pub trait ExchangeService: Send + Sync {
    /// Exchange name.
    fn name(&self) -> &str;

    fn pair(&self) -> &CurrencyPair;

    /// Cache and upstream counters.
    fn stats(&self) -> CoordinatorStats;

    /// Current bid/ask. Never panics or leaks transport errors; every failure
    /// is a typed [`ExchangeError`].
    async fn fetch_ticker(&self) -> ExchangeResult<Ticker>;
}

/// Counters for one coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub cache_hits: u64,
    pub short_circuits: u64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub last_refresh: Option<Timestamp>,
}

#[derive(Default)]
struct Counters {
    cache_hits: AtomicU64,
    short_circuits: AtomicU64,
    upstream_calls: AtomicU64,
    upstream_failures: AtomicU64,
    last_refresh: RwLock<Option<Timestamp>>,
}

/// Serializes fetches for one exchange/pair and fronts them with the rate
/// cache and negative-result cache.
pub struct FetchCoordinator {
    source: Arc<dyn RateSource>,
    pair: CurrencyPair,
    config: ExchangeConfig,
    upstream: Arc<dyn UpstreamClient>,
    caches: ExchangeCaches,
    keys: CacheKeys,
    rate_key: String,
    lock: Mutex<()>,
    counters: Counters,
}

impl FetchCoordinator {
    /// Create a coordinator. Fails with [`ExchangeError::InvalidConfig`]
    /// before touching the caches or the network if the configuration is
    /// unusable for this provider.
    pub fn new(
        source: Arc<dyn RateSource>,
        pair: CurrencyPair,
        config: ExchangeConfig,
        upstream: Arc<dyn UpstreamClient>,
        caches: ExchangeCaches,
    ) -> ExchangeResult<Self> {
        config.validate(source.requires_api_key())?;

        let keys = CacheKeys::new(source.name(), &pair.base);
        let rate_key = source.rate_key(&pair);

        Ok(Self {
            source,
            pair,
            config,
            upstream,
            caches,
            keys,
            rate_key,
            lock: Mutex::new(()),
            counters: Counters::default(),
        })
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    pub fn cache_keys(&self) -> &CacheKeys {
        &self.keys
    }

    pub fn stats(&self) -> CoordinatorStats {
        CoordinatorStats {
            cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
            short_circuits: self.counters.short_circuits.load(Ordering::Relaxed),
            upstream_calls: self.counters.upstream_calls.load(Ordering::Relaxed),
            upstream_failures: self.counters.upstream_failures.load(Ordering::Relaxed),
            last_refresh: *self.counters.last_refresh.read(),
        }
    }

    /// Produce a ticker, calling upstream only when neither cache answers.
    #[instrument(skip(self), fields(exchange = self.source.name(), pair = %self.pair))]
    pub async fn fetch_ticker(&self) -> ExchangeResult<Ticker> {
        // Held until return, on every path.
        let _guard = self.lock.lock().await;
        self.fetch_exclusive().await
    }

    async fn fetch_exclusive(&self) -> ExchangeResult<Ticker> {
        if let Some(rates) = self.caches.cached_rates(&self.keys).await {
            self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!("Using cached rates");
            return self.ticker_from(&rates, now());
        }

        if let Some(failure) = self.caches.last_failure(&self.keys).await {
            self.counters.short_circuits.fetch_add(1, Ordering::Relaxed);
            warn!(
                status = failure.status,
                recorded_at = %failure.recorded_at,
                "Skipping upstream call after recent failure"
            );
            return Err(ExchangeError::from_status(failure.status));
        }

        let response = self.call_upstream().await?;
        let payload = self.source.parse_response(&self.pair, &response.body);
        let rates = self.classify(&response, &payload).await?;

        if let Err(e) = self
            .caches
            .store_rates(&self.keys, rates.clone(), self.config.cache_ttl())
            .await
        {
            warn!(error = %e, "Failed to cache rates");
        }
        *self.counters.last_refresh.write() = Some(now());

        info!(
            status = response.status,
            rates = rates.len(),
            "Refreshed rates from upstream"
        );

        let timestamp = match payload.timestamp {
            ObservedAt::Reported(ts) => ts,
            ObservedAt::Unreported => now(),
            ObservedAt::Invalid => {
                debug!("Provider timestamp missing or out of range");
                return Err(ExchangeError::InvalidTicker(InvalidTickerError::new(
                    "provider timestamp missing or out of range",
                )));
            }
        };

        self.ticker_from(&rates, timestamp)
    }

    /// Perform the single upstream call, bounded by the configured timeout.
    async fn call_upstream(&self) -> ExchangeResult<UpstreamResponse> {
        let timeout = self.config.timeout();
        let request = self
            .source
            .build_request(&self.pair, &self.config)
            .with_timeout(timeout);

        self.counters.upstream_calls.fetch_add(1, Ordering::Relaxed);
        debug!(url = %request.url, timeout_ms = timeout.as_millis() as u64, "Calling upstream");

        // Polled in place: a cancelled caller drops the request together with
        // the lock guard. Client panics are caught here.
        let call = AssertUnwindSafe(self.upstream.get(request)).catch_unwind();

        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(response))) => return Ok(response),
            Ok(Ok(Err(e))) => e.to_string(),
            Ok(Err(_)) => "upstream call panicked".to_string(),
            Err(_) => format!("upstream call timed out after {}ms", timeout.as_millis()),
        };

        self.counters.upstream_failures.fetch_add(1, Ordering::Relaxed);
        error!(error = %outcome, "Upstream transport error");
        Err(ExchangeError::transport(outcome))
    }

    /// Turn a completed round-trip into a trusted rate map, remembering
    /// failure statuses in the negative-result cache.
    async fn classify(
        &self,
        response: &UpstreamResponse,
        payload: &ProviderPayload,
    ) -> ExchangeResult<RateMap> {
        if response.is_error() || !payload.success {
            self.remember_failure(response.status).await;
            warn!(status = response.status, "Upstream returned an unsuccessful response");
            return Err(ExchangeError::from_status(response.status));
        }

        let rates = sanitize(&payload.rates);
        if !rates.is_valid() {
            self.remember_failure(response.status).await;
            warn!(status = response.status, "No valid rates in upstream response");
            return Err(ExchangeError::InvalidResponse(
                "No valid rates in response".to_string(),
            ));
        }

        Ok(rates)
    }

    async fn remember_failure(&self, status: u16) {
        self.counters.upstream_failures.fetch_add(1, Ordering::Relaxed);

        match self
            .caches
            .record_failure(&self.keys, status, self.config.cache_ttl())
            .await
        {
            Ok(true) => debug!(status, "Recorded upstream failure"),
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to record upstream failure"),
        }
    }

    fn ticker_from(&self, rates: &RateMap, timestamp: Timestamp) -> ExchangeResult<Ticker> {
        Ticker::from_rate(rates.get(&self.rate_key), timestamp).map_err(|e| {
            debug!(rate_key = %self.rate_key, error = %e, "Rate unusable for ticker");
            ExchangeError::from(e)
        })
    }
}

#[async_trait]
impl ExchangeService for FetchCoordinator {
    fn name(&self) -> &str {
        self.source.name()
    }

    fn pair(&self) -> &CurrencyPair {
        &self.pair
    }

    fn stats(&self) -> CoordinatorStats {
        FetchCoordinator::stats(self)
    }

    async fn fetch_ticker(&self) -> ExchangeResult<Ticker> {
        FetchCoordinator::fetch_ticker(self).await
    }
}
