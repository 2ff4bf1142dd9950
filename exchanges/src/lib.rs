//! TickerFeed Exchanges
//!
//! Live bid/ask tickers from third-party currency rate APIs.
//!
//! # Features
//!
//! - One [`FetchCoordinator`] per exchange and pair, with at most one upstream
//!   call in flight per instance
//! - Process-local rate cache keyed by exchange and base currency
//! - Negative-result cache that suppresses calls during upstream outages
//! - Sanitizing of untrusted rate payloads before they reach a ticker
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tickerfeed_common::CurrencyPair;
//! use tickerfeed_exchanges::{
//!     create_exchange_service, ExchangeCaches, ExchangeConfig, ExchangeKind, ReqwestUpstream,
//! };
//!
//! let caches = ExchangeCaches::in_memory();
//! let service = create_exchange_service(
//!     ExchangeKind::OpenExchangeRates,
//!     CurrencyPair::new("USD", "EUR"),
//!     ExchangeConfig::default().with_api_key("app-id"),
//!     Arc::new(ReqwestUpstream::new()),
//!     caches,
//! )?;
//!
//! let ticker = service.fetch_ticker().await?;
//! ```

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod providers;
pub mod sanitize;
pub mod upstream;

pub use cache::{CacheError, CacheKeys, CacheService, ExchangeCaches, FailureStatus, LocalCache};
pub use config::{ExchangeConfig, ParamValue};
pub use coordinator::{CoordinatorStats, ExchangeService, FetchCoordinator};
pub use error::{ExchangeError, ExchangeResult};
pub use providers::{
    create_exchange_service, ExchangeKind, ObservedAt, ProviderPayload, RateSource,
};
pub use sanitize::{is_valid, sanitize, RateMap};
pub use upstream::{ReqwestUpstream, TransportError, UpstreamClient, UpstreamRequest, UpstreamResponse};

#[cfg(any(test, feature = "test-utils"))]
pub use upstream::MockUpstream;
