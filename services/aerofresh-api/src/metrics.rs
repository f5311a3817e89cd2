use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register_metrics(&registry).expect("metrics can be registered");
        registry
    };

    // HTTP metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("http_requests_total", "Total HTTP requests seen by the request guard"),
        &["method", "status"]
    ).expect("metric can be created");

    pub static ref HANDLER_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("handler_duration_seconds", "Wrapped handler duration in seconds")
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).expect("metric can be created");

    // Rate limiting
    pub static ref RATE_LIMITED_TOTAL: IntCounter = IntCounter::new(
        "rate_limited_requests_total",
        "Requests rejected for exceeding the client quota"
    ).expect("metric can be created");

    // Response cache
    pub static ref CACHE_HITS: IntCounter = IntCounter::new(
        "cache_hits_total",
        "Total cache hits"
    ).expect("metric can be created");

    pub static ref CACHE_MISSES: IntCounter = IntCounter::new(
        "cache_misses_total",
        "Total cache misses"
    ).expect("metric can be created");

    pub static ref CACHE_EVICTIONS: IntCounter = IntCounter::new(
        "cache_evictions_total",
        "Entries evicted because the cache was full"
    ).expect("metric can be created");

    // Business metrics
    pub static ref RISK_SCORES: Histogram = Histogram::with_opts(
        HistogramOpts::new("aircraft_risk_score", "Distribution of computed risk scores")
            .buckets(vec![10.0, 25.0, 40.0, 50.0, 60.0, 75.0, 90.0, 100.0])
    ).expect("metric can be created");

    pub static ref POSITIONS_UPSERTED: IntCounter = IntCounter::new(
        "live_positions_upserted_total",
        "Live position updates stored"
    ).expect("metric can be created");

    // Store metrics
    pub static ref STORE_QUERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("store_queries_total", "Total aircraft store queries"),
        &["operation"]
    ).expect("metric can be created");
}

/// Register all metrics with the given registry
pub fn register_metrics(registry: &Registry) -> Result<(), Box<dyn std::error::Error>> {
    // HTTP metrics
    registry.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    registry.register(Box::new(HANDLER_DURATION.clone()))?;

    // Guard metrics
    registry.register(Box::new(RATE_LIMITED_TOTAL.clone()))?;
    registry.register(Box::new(CACHE_HITS.clone()))?;
    registry.register(Box::new(CACHE_MISSES.clone()))?;
    registry.register(Box::new(CACHE_EVICTIONS.clone()))?;

    // Business metrics
    registry.register(Box::new(RISK_SCORES.clone()))?;
    registry.register(Box::new(POSITIONS_UPSERTED.clone()))?;

    // Store metrics
    registry.register(Box::new(STORE_QUERIES_TOTAL.clone()))?;

    #[cfg(target_os = "linux")]
    registry.register(Box::new(
        prometheus::process_collector::ProcessCollector::for_self(),
    ))?;

    Ok(())
}

/// Generate metrics output in Prometheus text format
pub fn render_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        let registry = Registry::new();
        let result = register_metrics(&registry);
        assert!(result.is_ok());
    }

    #[test]
    fn test_render_metrics() {
        RATE_LIMITED_TOTAL.inc();
        let output = render_metrics().unwrap();
        assert!(output.contains("rate_limited_requests_total"));
    }
}
