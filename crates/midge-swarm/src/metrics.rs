//! Prometheus metrics for load generation
//!
//! Metrics are registered lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

/// Completed action attempts by action name and outcome
pub static ACTIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "midge_actions_total",
        "Total number of completed action attempts",
        &["action", "outcome"]
    )
    .expect("Failed to register action counter")
});

/// Action response time histogram
pub static ACTION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "midge_action_duration_seconds",
        "Action response time in seconds",
        &["action"],
        // Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("Failed to register action duration histogram")
});

/// Logs delivered after their swarm stopped
pub static DISCARDED_LOGS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "midge_discarded_logs_total",
        "Action logs discarded because the swarm was already stopped"
    )
    .expect("Failed to register discarded log counter")
});

/// Record one completed action attempt.
pub fn record_action(action: &str, success: bool, duration_ms: f64) {
    let outcome = if success { "success" } else { "failure" };
    ACTIONS_TOTAL.with_label_values(&[action, outcome]).inc();
    ACTION_DURATION
        .with_label_values(&[action])
        .observe(duration_ms / 1000.0);
}
