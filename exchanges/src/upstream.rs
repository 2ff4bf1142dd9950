//! Upstream HTTP capability used by the fetch coordinator.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::config::DEFAULT_TIMEOUT_MS;

/// GET request issued to a rate provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub timeout: Duration,
}

impl UpstreamRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            query: Vec::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn with_params<I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.query.extend(params);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// First value for a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Status and raw body returned by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: String,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Failure before an HTTP status was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for TransportError {}

/// Issues GET requests to rate providers.
///
/// Returns `Ok` for every response that carries an HTTP status, including
/// 4xx/5xx; `Err` only for transport failures.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn get(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// Production client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::Client,
}

impl ReqwestUpstream {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("tickerfeed/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstream {
    async fn get(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::new(format!("request timeout: {}", e))
                } else if e.is_connect() {
                    TransportError::new(format!("connection failed: {}", e))
                } else {
                    TransportError::new(format!("request failed: {}", e))
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::new(format!("failed to read response body: {}", e)))?;

        Ok(UpstreamResponse { status, body })
    }
}

/// Scripted upstream for tests.
#[cfg(any(test, feature = "test-utils"))]
pub struct MockUpstream {
    replies: parking_lot::Mutex<std::collections::VecDeque<Result<UpstreamResponse, TransportError>>>,
    requests: parking_lot::Mutex<Vec<UpstreamRequest>>,
    delay: Duration,
    in_flight: std::sync::atomic::AtomicUsize,
    max_in_flight: std::sync::atomic::AtomicUsize,
}

#[cfg(any(test, feature = "test-utils"))]
impl MockUpstream {
    pub fn new() -> Self {
        Self {
            replies: parking_lot::Mutex::new(std::collections::VecDeque::new()),
            requests: parking_lot::Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: std::sync::atomic::AtomicUsize::new(0),
            max_in_flight: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Wait this long before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue a response.
    pub fn respond(self, status: u16, body: impl Into<String>) -> Self {
        self.replies
            .lock()
            .push_back(Ok(UpstreamResponse::new(status, body)));
        self
    }

    /// Queue a JSON response.
    pub fn respond_json(self, status: u16, body: serde_json::Value) -> Self {
        self.respond(status, body.to_string())
    }

    /// Queue a transport failure.
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.replies
            .lock()
            .push_back(Err(TransportError::new(message)));
        self
    }

    /// Number of calls received.
    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().clone()
    }

    /// Highest number of calls observed in flight at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl UpstreamClient for MockUpstream {
    async fn get(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        use std::sync::atomic::Ordering;

        self.requests.lock().push(request);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        // Decrements on completion and on cancellation alike.
        let _in_flight = InFlight(&self.in_flight);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("no scripted response")));

        reply
    }
}

#[cfg(any(test, feature = "test-utils"))]
struct InFlight<'a>(&'a std::sync::atomic::AtomicUsize);

#[cfg(any(test, feature = "test-utils"))]
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}
