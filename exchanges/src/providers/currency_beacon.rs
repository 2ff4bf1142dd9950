//! CurrencyBeacon (`/latest`).

use serde::Deserialize;
use serde_json::Value;
use tickerfeed_common::CurrencyPair;

use super::{parse_body, present, ObservedAt, ProviderPayload, RateSource};
use crate::config::ExchangeConfig;
use crate::upstream::UpstreamRequest;

#[derive(Debug, Deserialize)]
struct LatestResponse {
    response: Option<LatestBody>,
}

#[derive(Debug, Deserialize)]
struct LatestBody {
    rates: Option<Value>,
}

/// CurrencyBeacon adapter. The response date is not used as the ticker
/// timestamp; tickers are stamped when fetched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrencyBeacon;

impl RateSource for CurrencyBeacon {
    fn name(&self) -> &'static str {
        "currencybeacon"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.currencybeacon.com/v1"
    }

    fn build_request(&self, pair: &CurrencyPair, config: &ExchangeConfig) -> UpstreamRequest {
        let url = format!("{}/latest", config.base_url_or(self.default_base_url()));

        UpstreamRequest::get(url)
            .with_param("api_key", config.api_key().unwrap_or_default())
            .with_param("base", pair.base.code())
            .with_params(config.extra_query())
    }

    fn parse_response(&self, _pair: &CurrencyPair, body: &str) -> ProviderPayload {
        parse_body::<LatestResponse>(self.name(), body)
            .and_then(|r| r.response)
            .and_then(|r| present(r.rates))
            .map(|rates| ProviderPayload::new(rates, ObservedAt::Unreported))
            .unwrap_or_else(ProviderPayload::unsuccessful)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_request() {
        let config = ExchangeConfig::default()
            .with_api_key("beacon-key")
            .with_base_url("http://localhost:8080/v1/");
        let request = CurrencyBeacon.build_request(&CurrencyPair::new("USD", "EUR"), &config);

        assert_eq!(request.url, "http://localhost:8080/v1/latest");
        assert_eq!(request.param("api_key"), Some("beacon-key"));
        assert_eq!(request.param("base"), Some("USD"));
    }

    #[test]
    fn test_parse_response() {
        let pair = CurrencyPair::new("USD", "EUR");
        let body = json!({
            "meta": {"code": 200},
            "response": {"base": "USD", "rates": {"EUR": "0.92"}}
        })
        .to_string();

        let payload = CurrencyBeacon.parse_response(&pair, &body);
        assert!(payload.success);
        assert_eq!(payload.rates, json!({"EUR": "0.92"}));
        assert_eq!(payload.timestamp, ObservedAt::Unreported);

        assert!(!CurrencyBeacon.parse_response(&pair, r#"{"meta":{"code":401}}"#).success);
    }
}
