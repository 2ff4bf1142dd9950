//! Feed outcome metrics.

use std::collections::{BTreeMap, VecDeque};

/// Outcome counters and latency samples for ticker fetches.
#[derive(Debug, Clone)]
pub struct FeedMetrics {
    /// Total fetches attempted.
    pub total_fetches: u64,
    /// Fetches that returned a ticker.
    pub successful_fetches: u64,
    /// Fetches that returned an error.
    pub failed_fetches: u64,
    /// Failures keyed by error code.
    pub failures_by_code: BTreeMap<&'static str, u64>,
    latency_samples: VecDeque<u64>,
    max_samples: usize,
}

impl FeedMetrics {
    pub fn new() -> Self {
        Self {
            total_fetches: 0,
            successful_fetches: 0,
            failed_fetches: 0,
            failures_by_code: BTreeMap::new(),
            latency_samples: VecDeque::with_capacity(1024),
            max_samples: 10000,
        }
    }

    /// Record a fetch that produced a ticker.
    pub fn record_success(&mut self, latency_ms: u64) {
        self.total_fetches += 1;
        self.successful_fetches += 1;
        self.push_latency(latency_ms);
    }

    /// Record a failed fetch.
    pub fn record_failure(&mut self, code: &'static str, latency_ms: u64) {
        self.total_fetches += 1;
        self.failed_fetches += 1;
        *self.failures_by_code.entry(code).or_default() += 1;
        self.push_latency(latency_ms);
    }

    fn push_latency(&mut self, latency_ms: u64) {
        if self.latency_samples.len() >= self.max_samples {
            self.latency_samples.pop_front();
        }
        self.latency_samples.push_back(latency_ms);
    }

    /// Get average latency in ms.
    pub fn average_latency_ms(&self) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let sum: u64 = self.latency_samples.iter().sum();
        sum / self.latency_samples.len() as u64
    }

    pub fn p50_latency_ms(&self) -> u64 {
        self.percentile_latency(50)
    }

    pub fn p99_latency_ms(&self) -> u64 {
        self.percentile_latency(99)
    }

    fn percentile_latency(&self, percentile: usize) -> u64 {
        if self.latency_samples.is_empty() {
            return 0;
        }

        let mut sorted: Vec<_> = self.latency_samples.iter().copied().collect();
        sorted.sort_unstable();

        let idx = (sorted.len() * percentile / 100).min(sorted.len() - 1);
        sorted[idx]
    }

    /// Share of fetches that produced a ticker.
    pub fn success_rate(&self) -> f64 {
        if self.total_fetches == 0 {
            return 0.0;
        }

        self.successful_fetches as f64 / self.total_fetches as f64
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}
