//! Polling rounds over a set of exchange services.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tickerfeed_common::Ticker;
use tickerfeed_exchanges::{
    create_exchange_service, ExchangeCaches, ExchangeResult, ExchangeService, UpstreamClient,
};
use tracing::{info, warn};

use crate::config::FeedConfig;
use crate::metrics::FeedMetrics;

/// Outcome of one polling round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Fires concurrent `fetch_ticker` calls against every configured pair.
pub struct Feed {
    services: Vec<Arc<dyn ExchangeService>>,
    concurrency: usize,
    metrics: FeedMetrics,
}

impl Feed {
    /// Build one service per configured pair, sharing `upstream` and `caches`.
    pub fn new(
        config: &FeedConfig,
        upstream: Arc<dyn UpstreamClient>,
        caches: ExchangeCaches,
    ) -> ExchangeResult<Self> {
        let services = config
            .pairs()
            .into_iter()
            .map(|pair| {
                create_exchange_service(
                    config.exchange,
                    pair,
                    config.exchange_config.clone(),
                    Arc::clone(&upstream),
                    caches.clone(),
                )
            })
            .collect::<ExchangeResult<Vec<_>>>()?;

        Ok(Self {
            services,
            concurrency: config.concurrency.max(1),
            metrics: FeedMetrics::new(),
        })
    }

    pub fn services(&self) -> &[Arc<dyn ExchangeService>] {
        &self.services
    }

    pub fn metrics(&self) -> &FeedMetrics {
        &self.metrics
    }

    /// Run one round and record every outcome.
    pub async fn run_round(&mut self) -> RoundSummary {
        let calls = self.services.iter().flat_map(|service| {
            (0..self.concurrency).map(move |_| {
                let service = Arc::clone(service);
                async move {
                    let started = Instant::now();
                    let result = service.fetch_ticker().await;
                    (service, result, started.elapsed().as_millis() as u64)
                }
            })
        });

        let outcomes: Vec<(Arc<dyn ExchangeService>, ExchangeResult<Ticker>, u64)> =
            join_all(calls).await;

        let mut summary = RoundSummary::default();
        for (service, result, latency_ms) in outcomes {
            match result {
                Ok(ticker) => {
                    summary.succeeded += 1;
                    self.metrics.record_success(latency_ms);
                    info!(
                        exchange = service.name(),
                        pair = %service.pair(),
                        bid = %ticker.bid,
                        ask = %ticker.ask,
                        timestamp = %ticker.timestamp,
                        latency_ms,
                        "Ticker"
                    );
                }
                Err(e) => {
                    summary.failed += 1;
                    self.metrics.record_failure(e.error_code(), latency_ms);
                    warn!(
                        exchange = service.name(),
                        pair = %service.pair(),
                        code = e.error_code(),
                        error = %e,
                        latency_ms,
                        "Ticker fetch failed"
                    );
                }
            }
        }

        summary
    }

    /// Log per-service counters and the overall metrics.
    pub fn log_summary(&self) {
        for service in self.services() {
            let stats = service.stats();
            info!(
                exchange = service.name(),
                pair = %service.pair(),
                upstream_calls = stats.upstream_calls,
                upstream_failures = stats.upstream_failures,
                cache_hits = stats.cache_hits,
                short_circuits = stats.short_circuits,
                "Service stats"
            );
        }

        let metrics = self.metrics();
        info!(
            total = metrics.total_fetches,
            succeeded = metrics.successful_fetches,
            failed = metrics.failed_fetches,
            success_rate = metrics.success_rate(),
            avg_latency_ms = metrics.average_latency_ms(),
            p50_latency_ms = metrics.p50_latency_ms(),
            p99_latency_ms = metrics.p99_latency_ms(),
            "Feed summary"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tickerfeed_common::Currency;
    use tickerfeed_exchanges::{ExchangeConfig, ExchangeKind, MockUpstream};

    fn yadio_config(quotes: &[&str], concurrency: usize) -> FeedConfig {
        FeedConfig {
            exchange: ExchangeKind::Yadio,
            base: Currency::usd(),
            quotes: quotes.iter().map(|q| Currency::new(*q)).collect(),
            concurrency,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_round_shares_one_upstream_call() {
        let upstream = Arc::new(
            MockUpstream::new()
                .with_delay(Duration::from_millis(20))
                .respond_json(200, json!({"USD": {"EUR": 0.92, "VES": 36.5}})),
        );
        let mut feed = Feed::new(
            &yadio_config(&["EUR"], 3),
            upstream.clone(),
            ExchangeCaches::in_memory(),
        )
        .unwrap();

        let summary = feed.run_round().await;

        assert_eq!(summary, RoundSummary { succeeded: 3, failed: 0 });
        assert_eq!(upstream.calls(), 1);
        assert_eq!(upstream.max_in_flight(), 1);
        assert_eq!(feed.services()[0].stats().cache_hits, 2);

        let summary = feed.run_round().await;
        assert_eq!(summary.succeeded, 3);
        assert_eq!(upstream.calls(), 1);
        assert_eq!(feed.metrics().successful_fetches, 6);
    }

    #[tokio::test]
    async fn test_quotes_reuse_cached_base_rates() {
        let upstream = Arc::new(
            MockUpstream::new().respond_json(200, json!({"USD": {"EUR": 0.92, "VES": 36.5}})),
        );
        let config = yadio_config(&["EUR", "VES"], 1);
        let caches = ExchangeCaches::in_memory();

        let mut warm = Feed::new(&yadio_config(&["EUR"], 1), upstream.clone(), caches.clone())
            .unwrap();
        warm.run_round().await;

        let mut feed = Feed::new(&config, upstream.clone(), caches).unwrap();
        let summary = feed.run_round().await;

        assert_eq!(summary, RoundSummary { succeeded: 2, failed: 0 });
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn test_round_records_failures_by_code() {
        let upstream = Arc::new(MockUpstream::new().respond(503, "unavailable"));
        let mut feed = Feed::new(
            &yadio_config(&["EUR"], 2),
            upstream.clone(),
            ExchangeCaches::in_memory(),
        )
        .unwrap();

        let summary = feed.run_round().await;

        assert_eq!(summary.failed, 2);
        assert_eq!(upstream.calls(), 1);
        assert_eq!(feed.metrics().failures_by_code["UNKNOWN_EXCHANGE_SERVICE"], 2);
        assert_eq!(feed.services()[0].stats().short_circuits, 1);
    }

    #[tokio::test]
    async fn test_missing_quote_is_invalid_ticker() {
        let upstream = Arc::new(
            MockUpstream::new()
                .respond_json(200, json!({"USD": {"EUR": 0.92}}))
                .respond_json(200, json!({"USD": {"EUR": 0.92}})),
        );
        let mut feed = Feed::new(
            &yadio_config(&["EUR", "JPY"], 1),
            upstream,
            ExchangeCaches::in_memory(),
        )
        .unwrap();

        let summary = feed.run_round().await;

        assert_eq!(summary, RoundSummary { succeeded: 1, failed: 1 });
        assert_eq!(feed.metrics().failures_by_code["INVALID_TICKER"], 1);
    }

    #[test]
    fn test_new_rejects_missing_api_key() {
        let config = FeedConfig {
            exchange: ExchangeKind::ExchangeRateHost,
            exchange_config: ExchangeConfig::default(),
            ..Default::default()
        };

        let result = Feed::new(
            &config,
            Arc::new(MockUpstream::new()),
            ExchangeCaches::in_memory(),
        );
        assert!(result.is_err());
    }
}
