//! Prometheus metrics for the token engine.
//!
//! Counters register on the default registry the first time they are touched.

use once_cell::sync::Lazy;
use prometheus::{CounterVec, register_counter_vec};

/// Tokens issued counter.
pub static TOKENS_ISSUED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_engine_tokens_issued_total",
        "Total number of tokens issued",
        &["algorithm", "status"]
    )
    .expect("Failed to register tokens_issued metric")
});

/// Verifications counter.
pub static VERIFICATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_engine_verifications_total",
        "Total number of token verifications",
        &["source", "outcome"]
    )
    .expect("Failed to register verifications metric")
});

/// Key precedence counter, by the slot that verified the signature.
pub static KEY_MATCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_engine_key_matches_total",
        "Total number of signatures verified, by key slot",
        &["slot"]
    )
    .expect("Failed to register key_matches metric")
});

/// Tokens refreshed counter.
pub static TOKENS_REFRESHED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_engine_tokens_refreshed_total",
        "Total number of tokens refreshed",
        &["status"]
    )
    .expect("Failed to register tokens_refreshed metric")
});

/// Cache operations counter.
pub static CACHE_OPERATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "token_engine_cache_operations_total",
        "Total number of result cache operations",
        &["operation", "status"]
    )
    .expect("Failed to register cache_operations metric")
});

/// Record a token issuance.
pub fn record_token_issued(algorithm: &str, status: &str) {
    TOKENS_ISSUED.with_label_values(&[algorithm, status]).inc();
}

/// Record a verification outcome; `source` is `verified` or `cached`.
pub fn record_verification(source: &str, outcome: &str) {
    VERIFICATIONS.with_label_values(&[source, outcome]).inc();
}

/// Record which key slot verified a signature.
pub fn record_key_match(slot: &str) {
    KEY_MATCHES.with_label_values(&[slot]).inc();
}

/// Record a token refresh.
pub fn record_token_refreshed(status: &str) {
    TOKENS_REFRESHED.with_label_values(&[status]).inc();
}

/// Record a cache operation.
pub fn record_cache_operation(operation: &str, status: &str) {
    CACHE_OPERATIONS
        .with_label_values(&[operation, status])
        .inc();
}
