//! Prometheus metrics for the transaction pipeline
//!
//! Exposes metrics for:
//! - RPC endpoint failover
//! - Transaction submission by variant and dynamic-to-legacy fallbacks
//! - Receipt outcomes and wait latency
//!
//! Metrics live in the default registry; callers that serve them use `gather`.

use crate::tx::TxVariant;

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};

lazy_static! {
    // RPC metrics
    pub static ref RPC_FAILOVERS: Counter = register_counter!(
        "evm_txkit_rpc_failovers_total",
        "Total switches to the next RPC endpoint"
    ).unwrap();

    // Build metrics
    pub static ref BUILDER_FALLBACKS: Counter = register_counter!(
        "evm_txkit_builder_fallbacks_total",
        "Total dynamic fee builds that fell back to legacy"
    ).unwrap();

    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "evm_txkit_transactions_submitted_total",
        "Total transactions accepted by the node",
        &["variant"]
    ).unwrap();

    pub static ref TX_CONFIRMED: Counter = register_counter!(
        "evm_txkit_transactions_confirmed_total",
        "Total transactions mined with success status"
    ).unwrap();

    pub static ref TX_REVERTED: Counter = register_counter!(
        "evm_txkit_transactions_reverted_total",
        "Total transactions mined with failure status"
    ).unwrap();

    pub static ref TX_TIMED_OUT: Counter = register_counter!(
        "evm_txkit_transactions_timed_out_total",
        "Total receipt waits that hit the deadline"
    ).unwrap();

    pub static ref RECEIPT_LATENCY: Histogram = register_histogram!(
        "evm_txkit_receipt_latency_seconds",
        "Time from first poll to receipt",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();
}

/// Text exposition of every registered metric
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn record_rpc_failover() {
    RPC_FAILOVERS.inc();
}

pub fn record_builder_fallback() {
    BUILDER_FALLBACKS.inc();
}

pub fn record_tx_submitted(variant: TxVariant) {
    TX_SUBMITTED.with_label_values(&[variant.as_str()]).inc();
}

pub fn record_tx_confirmed() {
    TX_CONFIRMED.inc();
}

pub fn record_tx_reverted() {
    TX_REVERTED.inc();
}

pub fn record_tx_timed_out() {
    TX_TIMED_OUT.inc();
}

pub fn record_receipt_latency(latency_secs: f64) {
    RECEIPT_LATENCY.observe(latency_secs);
}
