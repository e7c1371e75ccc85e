//! Prometheus metrics for supplier calls and searches
//!
//! Tracks per-supplier call outcomes and latency, offers returned, the
//! cross-reference fallback and end-to-end search duration.
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails or never happens, recording functions are no-ops.

use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

use crate::models::Provider;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Outcome label for one supplier call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// Returned at least one offer
    Ok,
    /// Returned no offers
    Empty,
    /// Failed with an error
    Error,
    /// Exceeded its deadline
    Timeout,
    /// Denied by the rate limiter
    Limited,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Empty => "empty",
            Self::Error => "error",
            Self::Timeout => "timeout",
            Self::Limited => "limited",
        }
    }
}

struct SearchMetrics {
    supplier_requests: CounterVec,
    supplier_duration: HistogramVec,
    offers_returned: CounterVec,
    fallback_runs: CounterVec,
    cache_lookups: CounterVec,
    search_duration: Histogram,
}

static SEARCH_METRICS: OnceLock<SearchMetrics> = OnceLock::new();

/// Outcome of the one registration attempt, shared by every caller
static METRICS_INIT: OnceLock<Result<(), String>> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once and from several threads; registration runs
/// once and later calls report its outcome.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = partscout::metrics::init_metrics() {
///     tracing::warn!("Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    METRICS_INIT
        .get_or_init(|| register_metrics().map_err(|e| e.to_string()))
        .clone()
        .map_err(Into::into)
}

fn register_metrics() -> Result<(), Box<dyn std::error::Error>> {
    let metrics = SearchMetrics {
        supplier_requests: register_counter_vec!(
            "partscout_supplier_requests_total",
            "Supplier calls by provider and outcome",
            &["provider", "outcome"]
        )?,
        supplier_duration: register_histogram_vec!(
            "partscout_supplier_request_duration_seconds",
            "Supplier call duration in seconds",
            &["provider"],
            vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]
        )?,
        offers_returned: register_counter_vec!(
            "partscout_supplier_offers_total",
            "Offers returned by provider",
            &["provider"]
        )?,
        fallback_runs: register_counter_vec!(
            "partscout_fallback_runs_total",
            "Cross-reference fallback runs by outcome",
            &["outcome"]
        )?,
        cache_lookups: register_counter_vec!(
            "partscout_cache_lookups_total",
            "Offer cache lookups by provider and result",
            &["provider", "result"]
        )?,
        search_duration: register_histogram!(
            "partscout_search_duration_seconds",
            "End-to-end search duration in seconds",
            vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]
        )?,
    };

    SEARCH_METRICS
        .set(metrics)
        .map_err(|_| "Search metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    SEARCH_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record one supplier call
pub fn record_supplier_call(
    provider: Provider,
    outcome: CallOutcome,
    offers: usize,
    duration_secs: f64,
) {
    let Some(m) = SEARCH_METRICS.get() else {
        return;
    };

    m.supplier_requests
        .with_label_values(&[provider.as_str(), outcome.as_str()])
        .inc();
    m.supplier_duration
        .with_label_values(&[provider.as_str()])
        .observe(duration_secs);

    if offers > 0 {
        m.offers_returned
            .with_label_values(&[provider.as_str()])
            .inc_by(offers as f64);
    }
}

/// Record a fallback run and whether it found anything
pub fn record_fallback(hit: bool) {
    if let Some(m) = SEARCH_METRICS.get() {
        m.fallback_runs
            .with_label_values(&[if hit { "hit" } else { "miss" }])
            .inc();
    }
}

/// Record an offer cache lookup
pub fn record_cache_lookup(provider: Provider, hit: bool) {
    if let Some(m) = SEARCH_METRICS.get() {
        m.cache_lookups
            .with_label_values(&[provider.as_str(), if hit { "hit" } else { "miss" }])
            .inc();
    }
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a search timer
pub fn start_search_timer() -> MetricsTimer {
    match SEARCH_METRICS.get() {
        Some(m) => MetricsTimer::new(m.search_duration.start_timer()),
        None => MetricsTimer::noop(),
    }
}

// ============================================================================
// Tests
// ============================================================================
