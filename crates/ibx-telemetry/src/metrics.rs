//! Prometheus metrics for the ibx agent.
//!
//! Covers:
//! - Gateway link state and reconnections
//! - Request correlation (issued/matched/timed out)
//! - Protocol anomalies
//! - Validation and confirmation outcomes
//! - Order lifecycle
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should cause an immediate crash at startup rather than silent failure.
//! These panics only occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_histogram_vec,
    register_int_counter, register_int_gauge, CounterVec, Gauge, GaugeVec, HistogramVec,
    IntCounter, IntGauge,
};

/// Gateway link state (1 = ready, 0 = not ready).
pub static LINK_CONNECTED: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("ibx_link_connected", "Gateway link state (1=ready)").unwrap()
});

/// Gateway link state machine current state.
/// Labels: state (disconnected/connecting/ready/reconnecting/closed)
pub static LINK_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "ibx_link_state",
        "Gateway link state machine current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Total gateway reconnection attempts.
pub static LINK_RECONNECT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ibx_link_reconnect_total",
        "Total gateway reconnection attempts",
        &["reason"]
    )
    .unwrap()
});

/// Total requests issued to the gateway.
/// Labels: kind (accountSummary/positions/assetInfo/placeOrder/cancelOrder)
pub static REQUESTS_ISSUED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ibx_requests_issued_total",
        "Total requests issued to the gateway",
        &["kind"]
    )
    .unwrap()
});

/// Total replies matched to a pending request.
pub static REPLIES_MATCHED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "ibx_replies_matched_total",
        "Total replies matched to a pending request"
    )
    .unwrap()
});

/// Total requests that timed out without a reply.
pub static REQUEST_TIMEOUT_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ibx_request_timeout_total",
        "Total requests that timed out without a reply",
        &["kind"]
    )
    .unwrap()
});

/// Request round-trip latency in milliseconds.
pub static REQUEST_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "ibx_request_latency_ms",
        "Request round-trip latency in milliseconds",
        &["kind"],
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 5000.0]
    )
    .unwrap()
});

/// Total protocol anomalies.
/// Labels: kind (late_reply/unmatched_reply/unknown_order/illegal_transition)
pub static PROTOCOL_ANOMALY_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ibx_protocol_anomaly_total",
        "Total protocol anomalies observed on the gateway link",
        &["kind"]
    )
    .unwrap()
});

/// Total intents rejected by validation.
/// Labels: rule
pub static VALIDATION_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ibx_validation_rejected_total",
        "Total intents rejected by validation",
        &["rule"]
    )
    .unwrap()
});

/// Confirmation ticket outcomes.
/// Labels: outcome (issued/confirmed/declined/expired/rejected)
pub static TICKET_OUTCOME_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ibx_ticket_outcome_total",
        "Confirmation ticket outcomes",
        &["outcome"]
    )
    .unwrap()
});

/// Total orders submitted.
/// Labels: side (buy/sell)
pub static ORDERS_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ibx_orders_submitted_total",
        "Total orders submitted to the gateway",
        &["side"]
    )
    .unwrap()
});

/// Total orders reaching a terminal state.
/// Labels: state (filled/cancelled/rejected)
pub static ORDERS_TERMINAL_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "ibx_orders_terminal_total",
        "Total orders reaching a terminal state",
        &["state"]
    )
    .unwrap()
});

/// Current number of active (non-terminal) orders.
pub static ORDERS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("ibx_orders_active", "Current number of active orders").unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record gateway link ready.
    pub fn link_up() {
        LINK_CONNECTED.set(1.0);
    }

    /// Record gateway link lost.
    pub fn link_down() {
        LINK_CONNECTED.set(0.0);
    }

    /// Set link state machine state.
    /// Only the active state should be set to 1, all others to 0.
    pub fn link_state_set(state: &str) {
        for s in &[
            "disconnected",
            "connecting",
            "ready",
            "reconnecting",
            "closed",
        ] {
            LINK_STATE.with_label_values(&[s]).set(0.0);
        }
        LINK_STATE.with_label_values(&[state]).set(1.0);
    }

    /// Record gateway reconnection.
    pub fn link_reconnect(reason: &str) {
        LINK_RECONNECT_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record request issued.
    pub fn request_issued(kind: &str) {
        REQUESTS_ISSUED_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record reply matched to its pending request.
    pub fn reply_matched() {
        REPLIES_MATCHED_TOTAL.inc();
    }

    /// Record request timeout.
    pub fn request_timeout(kind: &str) {
        REQUEST_TIMEOUT_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record request round-trip latency.
    pub fn request_latency(kind: &str, latency_ms: f64) {
        REQUEST_LATENCY_MS
            .with_label_values(&[kind])
            .observe(latency_ms);
    }

    /// Record protocol anomaly.
    pub fn protocol_anomaly(kind: &str) {
        PROTOCOL_ANOMALY_TOTAL.with_label_values(&[kind]).inc();
    }

    /// Record intent rejected by validation.
    pub fn validation_rejected(rule: &str) {
        VALIDATION_REJECTED_TOTAL.with_label_values(&[rule]).inc();
    }

    /// Record confirmation ticket outcome.
    pub fn ticket_outcome(outcome: &str) {
        TICKET_OUTCOME_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record order submitted.
    pub fn order_submitted(side: &str) {
        ORDERS_SUBMITTED_TOTAL.with_label_values(&[side]).inc();
        ORDERS_ACTIVE.inc();
    }

    /// Record order reaching a terminal state.
    pub fn order_terminal(state: &str) {
        ORDERS_TERMINAL_TOTAL.with_label_values(&[state]).inc();
        ORDERS_ACTIVE.dec();
    }
}
