//! Open Exchange Rates (`/latest.json`).

use serde::Deserialize;
use serde_json::Value;
use tickerfeed_common::CurrencyPair;

use super::{parse_body, present, ObservedAt, ProviderPayload, RateSource};
use crate::config::ExchangeConfig;
use crate::upstream::UpstreamRequest;

#[derive(Debug, Deserialize)]
struct LatestResponse {
    timestamp: Option<i64>,
    rates: Option<Value>,
}

/// Open Exchange Rates adapter. Rates are quoted against the account's base
/// currency; pass `base` through extra params on plans that allow it.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenExchangeRates;

impl RateSource for OpenExchangeRates {
    fn name(&self) -> &'static str {
        "openexchangerates"
    }

    fn default_base_url(&self) -> &'static str {
        "https://openexchangerates.org/api"
    }

    fn build_request(&self, _pair: &CurrencyPair, config: &ExchangeConfig) -> UpstreamRequest {
        let url = format!("{}/latest.json", config.base_url_or(self.default_base_url()));

        UpstreamRequest::get(url)
            .with_param("app_id", config.api_key().unwrap_or_default())
            .with_param("prettyprint", false)
            .with_param("show_alternative", false)
            .with_params(config.extra_query())
    }

    fn parse_response(&self, _pair: &CurrencyPair, body: &str) -> ProviderPayload {
        let Some(response) = parse_body::<LatestResponse>(self.name(), body) else {
            return ProviderPayload::unsuccessful();
        };

        match present(response.rates) {
            Some(rates) => {
                ProviderPayload::new(rates, ObservedAt::from_unix_seconds(response.timestamp))
            }
            None => ProviderPayload::unsuccessful(),
        }
    }
}
