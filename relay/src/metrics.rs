use crate::errors::Result;
use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref READINGS_SAVED_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_readings_saved_total",
        "Total readings written to the database"
    ))
    .expect("valid metric opts");
    pub static ref INVALID_REQUESTS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_invalid_requests_total",
        "Total requests rejected by input validation"
    ))
    .expect("valid metric opts");
    pub static ref LATEST_HITS_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_latest_hits_total",
        "Total latest-queries that found a reading"
    ))
    .expect("valid metric opts");
    pub static ref LATEST_MISSES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_latest_misses_total",
        "Total latest-queries for devices with no readings"
    ))
    .expect("valid metric opts");
    pub static ref DB_FAILURES_TOTAL: Counter = Counter::with_opts(Opts::new(
        "relay_db_failures_total",
        "Total failed database operations"
    ))
    .expect("valid metric opts");
    pub static ref DB_LATENCY_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "relay_db_latency_seconds",
            "Time taken by a single database operation"
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0
        ]),
        &["op"]
    )
    .expect("valid metric opts");
}

pub fn init_metrics() -> Result<()> {
    REGISTRY.register(Box::new(READINGS_SAVED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(INVALID_REQUESTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LATEST_HITS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(LATEST_MISSES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DB_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(DB_LATENCY_SECONDS.clone()))?;
    Ok(())
}

pub fn gather_metrics() -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
