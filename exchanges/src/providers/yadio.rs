//! Yadio (`/exrates/{base}`).

use std::collections::HashMap;

use serde_json::Value;
use tickerfeed_common::CurrencyPair;

use super::{parse_body, present, ObservedAt, ProviderPayload, RateSource};
use crate::config::ExchangeConfig;
use crate::upstream::UpstreamRequest;

/// Yadio adapter. No credential required; the rates object is keyed by the
/// uppercase base currency.
#[derive(Debug, Clone, Copy, Default)]
pub struct Yadio;

impl RateSource for Yadio {
    fn name(&self) -> &'static str {
        "yadio"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.yadio.io/exrates"
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    fn build_request(&self, pair: &CurrencyPair, config: &ExchangeConfig) -> UpstreamRequest {
        let url = format!(
            "{}/{}",
            config.base_url_or(self.default_base_url()),
            pair.base.code().to_lowercase()
        );

        UpstreamRequest::get(url).with_params(config.extra_query())
    }

    fn parse_response(&self, pair: &CurrencyPair, body: &str) -> ProviderPayload {
        parse_body::<HashMap<String, Value>>(self.name(), body)
            .and_then(|mut r| present(r.remove(pair.base.code())))
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
        let config = ExchangeConfig::default();
        let request = Yadio.build_request(&CurrencyPair::new("USD", "VES"), &config);

        assert_eq!(request.url, "https://api.yadio.io/exrates/usd");
        assert!(request.query.is_empty());
    }

    #[test]
    fn test_parse_response() {
        let pair = CurrencyPair::new("USD", "VES");
        let body = json!({
            "USD": {"VES": 36.5, "EUR": 0.92},
            "base": "USD",
            "timestamp": 1_700_000_000_000i64
        })
        .to_string();

        let payload = Yadio.parse_response(&pair, &body);
        assert!(payload.success);
        assert_eq!(payload.rates["VES"], json!(36.5));
        assert_eq!(payload.timestamp, ObservedAt::Unreported);

        assert!(!Yadio.parse_response(&pair, r#"{"error":"not found"}"#).success);
    }
}
