//! Proxy metrics collection.

use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use storage::CacheOutcome;

/// Request counters for the proxy.
///
/// Every event is mirrored to the `metrics` facade, so a Prometheus recorder
/// installed by the binary sees the same numbers tests read from here.
#[derive(Debug, Default)]
pub struct ProxyMetrics {
    pub requests: AtomicU64,
    pub corrected: AtomicU64,
    pub passthrough: AtomicU64,
    pub upstream_errors: AtomicU64,
    pub bad_requests: AtomicU64,
    pub render_fallbacks: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_coalesced: AtomicU64,
}

/// Point-in-time copy of [`ProxyMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: u64,
    pub corrected: u64,
    pub passthrough: u64,
    pub upstream_errors: u64,
    pub bad_requests: u64,
    pub render_fallbacks: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_coalesced: u64,
}

impl ProxyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        counter!("proxy_requests_total").increment(1);
    }

    /// A tile returned with corrections drawn on it.
    pub fn record_corrected(&self, render_ms: f64) {
        self.corrected.fetch_add(1, Ordering::Relaxed);
        counter!("proxy_corrected_total").increment(1);
        histogram!("proxy_render_duration_ms").record(render_ms);
    }

    /// A tile returned exactly as the upstream sent it.
    pub fn record_passthrough(&self) {
        self.passthrough.fetch_add(1, Ordering::Relaxed);
        counter!("proxy_passthrough_total").increment(1);
    }

    pub fn record_upstream_error(&self) {
        self.upstream_errors.fetch_add(1, Ordering::Relaxed);
        counter!("proxy_upstream_errors_total").increment(1);
    }

    pub fn record_bad_request(&self) {
        self.bad_requests.fetch_add(1, Ordering::Relaxed);
        counter!("proxy_bad_requests_total").increment(1);
    }

    /// Correction lookup or rendering failed and the original was served.
    pub fn record_render_fallback(&self) {
        self.render_fallbacks.fetch_add(1, Ordering::Relaxed);
        counter!("proxy_render_fallbacks_total").increment(1);
    }

    pub fn record_cache_outcome(&self, outcome: CacheOutcome) {
        match outcome {
            CacheOutcome::Hit => {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                counter!("correction_cache_hits_total").increment(1);
            }
            CacheOutcome::Miss => {
                self.cache_misses.fetch_add(1, Ordering::Relaxed);
                counter!("correction_cache_misses_total").increment(1);
            }
            CacheOutcome::Coalesced => {
                self.cache_coalesced.fetch_add(1, Ordering::Relaxed);
                counter!("correction_cache_coalesced_total").increment(1);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            corrected: self.corrected.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
            upstream_errors: self.upstream_errors.load(Ordering::Relaxed),
            bad_requests: self.bad_requests.load(Ordering::Relaxed),
            render_fallbacks: self.render_fallbacks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_coalesced: self.cache_coalesced.load(Ordering::Relaxed),
        }
    }
}

/// Simple wall-clock timer for pipeline stages.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_micros() as f64 / 1000.0
    }
}
