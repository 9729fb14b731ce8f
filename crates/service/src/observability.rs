use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

// Prometheus metrics (default registry)
pub static SAVES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "formsave_saves_total",
        "Successful draft saves by sink",
        &["sink"]
    )
    .expect("register saves_total")
});

pub static SAVE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "formsave_save_failures_total",
        "Failed draft saves by sink",
        &["sink"]
    )
    .expect("register save_failures_total")
});

pub static NOTICES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "formsave_notices_total",
        "User-visible notices emitted by level",
        &["level"]
    )
    .expect("register notices_total")
});

/// Render the default registry in the Prometheus text format.
pub fn encode_metrics() -> Result<String, String> {
    // touch lazies so every family shows up even before the first save
    Lazy::force(&SAVES_TOTAL);
    Lazy::force(&SAVE_FAILURES_TOTAL);
    Lazy::force(&NOTICES_TOTAL);

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).map_err(|e| e.to_string())?;
    String::from_utf8(buffer).map_err(|e| e.to_string())
}
