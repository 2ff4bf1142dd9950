//! Feed configuration.

use std::time::Duration;

use tickerfeed_common::{Currency, CurrencyPair};
use tickerfeed_exchanges::{ExchangeConfig, ExchangeKind, ParamValue};
use tracing::warn;

/// Main feed configuration.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Rate provider to poll.
    pub exchange: ExchangeKind,
    /// Base currency shared by every polled pair.
    pub base: Currency,
    /// Quote currencies, one coordinator each.
    pub quotes: Vec<Currency>,
    /// Provider configuration.
    pub exchange_config: ExchangeConfig,
    /// Delay between polling rounds.
    pub poll_interval: Duration,
    /// Rounds to run (0 = until interrupted).
    pub rounds: u64,
    /// Concurrent callers per pair per round.
    pub concurrency: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            exchange: ExchangeKind::Yadio,
            base: Currency::usd(),
            quotes: vec![Currency::eur()],
            exchange_config: ExchangeConfig::default(),
            poll_interval: Duration::from_secs(60),
            rounds: 0,
            concurrency: 1,
        }
    }
}

impl FeedConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(exchange) = lookup("TICKERFEED_EXCHANGE") {
            match exchange.parse() {
                Ok(kind) => config.exchange = kind,
                Err(e) => warn!(error = %e, "Ignoring TICKERFEED_EXCHANGE"),
            }
        }

        if let Some(base) = lookup("TICKERFEED_BASE") {
            config.base = Currency::new(base);
        }

        if let Some(quotes) = lookup("TICKERFEED_QUOTES") {
            config.quotes = parse_quotes(&quotes);
        }

        if let Some(key) = lookup("TICKERFEED_API_KEY") {
            config.exchange_config.api_key = Some(key);
        }

        if let Some(url) = lookup("TICKERFEED_BASE_URL") {
            config.exchange_config.base_url = Some(url);
        }

        if let Some(timeout) = lookup("TICKERFEED_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                config.exchange_config.timeout_ms = Some(ms);
            }
        }

        if let Some(seconds) = lookup("TICKERFEED_CACHE_SECONDS") {
            if let Ok(seconds) = seconds.parse() {
                config.exchange_config.cache_ttl_seconds = Some(seconds);
            }
        }

        if let Some(interval) = lookup("TICKERFEED_POLL_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse() {
                config.poll_interval = Duration::from_secs(secs);
            }
        }

        if let Some(params) = lookup("TICKERFEED_EXTRA_PARAMS") {
            match serde_json::from_str(&params) {
                Ok(extra) => config.exchange_config.extra_params = extra,
                Err(e) => warn!(error = %e, "Ignoring TICKERFEED_EXTRA_PARAMS"),
            }
        }

        config
    }

    /// Pairs to poll.
    pub fn pairs(&self) -> Vec<CurrencyPair> {
        self.quotes
            .iter()
            .map(|quote| CurrencyPair::new(self.base.clone(), quote.clone()))
            .collect()
    }

    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<ParamValue>) {
        self.exchange_config
            .extra_params
            .insert(name.into(), value.into());
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.base.code().is_empty() {
            return Err("Base currency cannot be empty".to_string());
        }

        if self.quotes.is_empty() || self.quotes.iter().any(|q| q.code().is_empty()) {
            return Err("At least one quote currency is required".to_string());
        }

        if self.poll_interval.is_zero() {
            return Err("Poll interval cannot be zero".to_string());
        }

        if self.concurrency == 0 {
            return Err("Concurrency must be at least 1".to_string());
        }

        self.exchange_config
            .validate(self.exchange.source().requires_api_key())
            .map_err(|e| e.to_string())
    }
}

/// Split a comma-separated currency list.
pub fn parse_quotes(raw: &str) -> Vec<Currency> {
    raw.split(',')
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .map(Currency::new)
        .collect()
}
