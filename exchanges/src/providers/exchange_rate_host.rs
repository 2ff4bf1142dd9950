//! exchangerate.host (`/live`).

use serde::Deserialize;
use serde_json::Value;
use tickerfeed_common::CurrencyPair;

use super::{parse_body, present, ObservedAt, ProviderPayload, RateSource};
use crate::config::ExchangeConfig;
use crate::upstream::UpstreamRequest;

#[derive(Debug, Deserialize)]
struct LiveResponse {
    #[serde(default)]
    success: bool,
    timestamp: Option<i64>,
    quotes: Option<Value>,
}

/// exchangerate.host adapter. Quotes are keyed by concatenated symbol
/// (`USDEUR`), and a `success: false` body is a provider failure even with a
/// 200 status.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExchangeRateHost;

impl RateSource for ExchangeRateHost {
    fn name(&self) -> &'static str {
        "exchangeratehost"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.exchangerate.host"
    }

    fn build_request(&self, pair: &CurrencyPair, config: &ExchangeConfig) -> UpstreamRequest {
        let url = format!("{}/live", config.base_url_or(self.default_base_url()));

        UpstreamRequest::get(url)
            .with_param("source", pair.base.code())
            .with_param("access_key", config.api_key().unwrap_or_default())
            .with_params(config.extra_query())
    }

    fn parse_response(&self, _pair: &CurrencyPair, body: &str) -> ProviderPayload {
        let Some(response) = parse_body::<LiveResponse>(self.name(), body) else {
            return ProviderPayload::unsuccessful();
        };

        match present(response.quotes) {
            Some(quotes) if response.success => {
                ProviderPayload::new(quotes, ObservedAt::from_unix_seconds(response.timestamp))
            }
            _ => ProviderPayload::unsuccessful(),
        }
    }

    fn rate_key(&self, pair: &CurrencyPair) -> String {
        pair.symbol()
    }
}
