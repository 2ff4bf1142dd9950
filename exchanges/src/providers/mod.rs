//! Provider request/response mappings.
//!
//! Each provider only knows how to shape its upstream request and where the
//! rates live in its response. Caching, locking and validation are handled by
//! [`FetchCoordinator`](crate::coordinator::FetchCoordinator).

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;
use tickerfeed_common::{from_unix_seconds, CurrencyPair, Timestamp};

use crate::cache::ExchangeCaches;
use crate::config::ExchangeConfig;
use crate::coordinator::{ExchangeService, FetchCoordinator};
use crate::error::{ExchangeError, ExchangeResult};
use crate::upstream::{UpstreamClient, UpstreamRequest};

pub mod currency_beacon;
pub mod exchange_rate_host;
pub mod open_exchange_rates;
pub mod yadio;

pub use currency_beacon::CurrencyBeacon;
pub use exchange_rate_host::ExchangeRateHost;
pub use open_exchange_rates::OpenExchangeRates;
pub use yadio::Yadio;

/// Provider response reduced to what the coordinator needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderPayload {
    /// False when the provider reported failure or the rates field is absent.
    pub success: bool,
    /// Raw, unsanitized rates object.
    pub rates: Value,
    /// Provider-reported observation time.
    pub timestamp: ObservedAt,
}

impl ProviderPayload {
    pub fn new(rates: Value, timestamp: ObservedAt) -> Self {
        Self {
            success: true,
            rates,
            timestamp,
        }
    }

    pub fn unsuccessful() -> Self {
        Self {
            success: false,
            rates: Value::Null,
            timestamp: ObservedAt::Unreported,
        }
    }
}

/// Observation time a provider attaches to its rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservedAt {
    /// The provider sends no time; tickers carry the fetch time.
    Unreported,
    /// Provider time, passed through unchecked.
    Reported(Timestamp),
    /// The provider always sends a time, but this body's is missing or out
    /// of range.
    Invalid,
}

impl ObservedAt {
    /// Required provider time in Unix seconds. Zero and negative values are
    /// kept as reported.
    pub fn from_unix_seconds(seconds: Option<i64>) -> Self {
        match seconds.and_then(from_unix_seconds) {
            Some(ts) => ObservedAt::Reported(ts),
            None => ObservedAt::Invalid,
        }
    }
}

/// Request and response shape of one rate provider.
pub trait RateSource: Send + Sync {
    /// Name used in cache keys and logs.
    fn name(&self) -> &'static str;

    fn default_base_url(&self) -> &'static str;

    fn requires_api_key(&self) -> bool {
        true
    }

    /// Upstream request for the pair, without the timeout applied.
    fn build_request(&self, pair: &CurrencyPair, config: &ExchangeConfig) -> UpstreamRequest;

    /// Extract the rates from a response body. Bodies that do not parse yield
    /// [`ProviderPayload::unsuccessful`].
    fn parse_response(&self, pair: &CurrencyPair, body: &str) -> ProviderPayload;

    /// Key of the quote's rate inside the rates object.
    fn rate_key(&self, pair: &CurrencyPair) -> String {
        pair.quote.code().to_string()
    }
}

/// Supported rate providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeKind {
    OpenExchangeRates,
    CurrencyBeacon,
    ExchangeRateHost,
    Yadio,
}

impl ExchangeKind {
    pub fn all() -> [ExchangeKind; 4] {
        [
            ExchangeKind::OpenExchangeRates,
            ExchangeKind::CurrencyBeacon,
            ExchangeKind::ExchangeRateHost,
            ExchangeKind::Yadio,
        ]
    }

    pub fn source(&self) -> Arc<dyn RateSource> {
        match self {
            ExchangeKind::OpenExchangeRates => Arc::new(OpenExchangeRates),
            ExchangeKind::CurrencyBeacon => Arc::new(CurrencyBeacon),
            ExchangeKind::ExchangeRateHost => Arc::new(ExchangeRateHost),
            ExchangeKind::Yadio => Arc::new(Yadio),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::OpenExchangeRates => "openexchangerates",
            ExchangeKind::CurrencyBeacon => "currencybeacon",
            ExchangeKind::ExchangeRateHost => "exchangeratehost",
            ExchangeKind::Yadio => "yadio",
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeKind {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        ExchangeKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ExchangeError::InvalidConfig(format!("Unknown exchange: {}", s)))
    }
}

/// Build the ticker service for one exchange and pair.
///
/// Configuration is validated here; a missing required credential fails before
/// any cache or network access.
pub fn create_exchange_service(
    kind: ExchangeKind,
    pair: CurrencyPair,
    config: ExchangeConfig,
    upstream: Arc<dyn UpstreamClient>,
    caches: ExchangeCaches,
) -> ExchangeResult<Arc<dyn ExchangeService>> {
    let coordinator = FetchCoordinator::new(kind.source(), pair, config, upstream, caches)?;
    Ok(Arc::new(coordinator))
}

/// Deserialize a body, logging parse failures at debug level.
pub(crate) fn parse_body<T: serde::de::DeserializeOwned>(provider: &str, body: &str) -> Option<T> {
    match serde_json::from_str(body) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!(provider, error = %e, "Unparseable provider response");
            None
        }
    }
}

/// Treat a JSON `null` like an absent field.
pub(crate) fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::MockUpstream;

    #[test]
    fn test_exchange_kind_parsing() {
        assert_eq!(
            "openexchangerates".parse::<ExchangeKind>().unwrap(),
            ExchangeKind::OpenExchangeRates
        );
        assert_eq!(
            "Open-Exchange-Rates".parse::<ExchangeKind>().unwrap(),
            ExchangeKind::OpenExchangeRates
        );
        assert_eq!("YADIO".parse::<ExchangeKind>().unwrap(), ExchangeKind::Yadio);
        assert!("binance".parse::<ExchangeKind>().is_err());

        for kind in ExchangeKind::all() {
            assert_eq!(kind.to_string().parse::<ExchangeKind>().unwrap(), kind);
            assert_eq!(kind.source().name(), kind.as_str());
        }
    }

    #[test]
    fn test_observed_at_from_unix_seconds() {
        assert_eq!(
            ObservedAt::from_unix_seconds(Some(1_700_000_000)),
            ObservedAt::Reported(from_unix_seconds(1_700_000_000).unwrap())
        );
        assert!(matches!(
            ObservedAt::from_unix_seconds(Some(0)),
            ObservedAt::Reported(ts) if ts.timestamp_millis() == 0
        ));
        assert!(matches!(
            ObservedAt::from_unix_seconds(Some(-60)),
            ObservedAt::Reported(ts) if ts.timestamp_millis() == -60_000
        ));
        assert_eq!(ObservedAt::from_unix_seconds(None), ObservedAt::Invalid);
        assert_eq!(
            ObservedAt::from_unix_seconds(Some(i64::MAX)),
            ObservedAt::Invalid
        );
    }

    #[test]
    fn test_factory_requires_api_key() {
        let upstream = Arc::new(MockUpstream::new());
        let caches = ExchangeCaches::in_memory();

        for kind in [
            ExchangeKind::OpenExchangeRates,
            ExchangeKind::CurrencyBeacon,
            ExchangeKind::ExchangeRateHost,
        ] {
            let result = create_exchange_service(
                kind,
                CurrencyPair::new("USD", "EUR"),
                ExchangeConfig::default(),
                upstream.clone(),
                caches.clone(),
            );
            assert!(matches!(result, Err(ExchangeError::InvalidConfig(_))));
        }

        assert!(create_exchange_service(
            ExchangeKind::Yadio,
            CurrencyPair::new("USD", "EUR"),
            ExchangeConfig::default(),
            upstream.clone(),
            caches,
        )
        .is_ok());
        assert_eq!(upstream.calls(), 0);
    }
}
