//! Per-exchange adapter configuration.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

/// Upstream call bound used when `timeout_ms` is unset or zero.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Cache TTL used when `cache_ttl_seconds` is unset or zero.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Provider-specific query parameter value, passed through verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

/// Configuration for one exchange adapter instance.
///
/// Supplied once at construction and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExchangeConfig {
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    /// Provider credential.
    pub api_key: Option<String>,
    /// Upstream call bound in milliseconds.
    pub timeout_ms: Option<u64>,
    /// TTL for both positive and negative cache entries.
    #[serde(alias = "cacheSeconds")]
    pub cache_ttl_seconds: Option<u64>,
    /// Extra query parameters appended to every upstream request.
    pub extra_params: BTreeMap<String, ParamValue>,
}

impl ExchangeConfig {
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_cache_ttl_seconds(mut self, seconds: u64) -> Self {
        self.cache_ttl_seconds = Some(seconds);
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.extra_params.insert(name.into(), value.into());
        self
    }

    /// Effective upstream call bound.
    pub fn timeout(&self) -> Duration {
        match self.timeout_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    /// Effective cache TTL.
    pub fn cache_ttl(&self) -> Duration {
        match self.cache_ttl_seconds {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        }
    }

    /// Non-blank API key, if configured.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Endpoint to call, falling back to the provider default.
    pub fn base_url_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.base_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
            .unwrap_or(default)
    }

    /// Extra params rendered as query pairs.
    pub fn extra_query(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.extra_params
            .iter()
            .map(|(name, value)| (name.clone(), value.to_string()))
    }

    /// Validate configuration.
    pub fn validate(&self, requires_api_key: bool) -> ExchangeResult<()> {
        if requires_api_key && self.api_key().is_none() {
            return Err(ExchangeError::InvalidConfig("API key is required".to_string()));
        }

        if let Some(url) = &self.base_url {
            if url.trim().is_empty() {
                return Err(ExchangeError::InvalidConfig(
                    "Base URL cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}
