//! Prometheus metrics for the dealer.
//!
//! Covers:
//! - Stream connection state and decode failures
//! - Frames and handler failures per table
//! - Readiness, net exposure and reference price
//! - Order submissions and supervisor restarts
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which is a programming error caught at first use.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_gauge_vec, register_int_counter,
    register_int_gauge, CounterVec, Encoder, Gauge, GaugeVec, IntCounter, IntGauge, TextEncoder,
};

/// Connection state labels, in lifecycle order.
pub const CONNECTION_STATES: [&str; 6] = [
    "disconnected",
    "connecting",
    "authenticating",
    "subscribing",
    "streaming",
    "failed",
];

/// Stream connection state (1 = active state).
pub static CONNECTION_STATE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "dealer_connection_state",
        "Stream connection state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

/// Frames processed per table.
pub static FRAMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dealer_frames_total",
        "Decoded stream frames processed",
        &["table"]
    )
    .unwrap()
});

/// Frames dropped because they could not be decoded.
pub static DECODE_ERRORS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "dealer_decode_errors",
        "Undecodable frames dropped by the current stream"
    )
    .unwrap()
});

/// Frames whose handler failed.
pub static HANDLER_ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dealer_handler_errors_total",
        "Frames whose handler failed",
        &["table"]
    )
    .unwrap()
});

/// Readiness (1 = ready).
pub static READY: Lazy<IntGauge> =
    Lazy::new(|| register_int_gauge!("dealer_ready", "Adapter readiness (1=ready)").unwrap());

/// Net exposure in contracts.
pub static NET_EXPOSURE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("dealer_net_exposure", "Net exposure in contracts").unwrap()
});

/// Reference price.
pub static REFERENCE_PRICE: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("dealer_reference_price", "Current reference price").unwrap()
});

/// Orders by side and result.
pub static ORDERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "dealer_orders_total",
        "Exposure change requests by side and result",
        &["side", "result"]
    )
    .unwrap()
});

/// Adapter restarts performed by the supervisor.
pub static ADAPTER_RESTARTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "dealer_adapter_restarts_total",
        "Adapter restarts after failure"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Set the active connection state. Unknown labels clear every state.
    pub fn connection_state_set(state: &str) {
        for s in CONNECTION_STATES {
            CONNECTION_STATE.with_label_values(&[s]).set(0.0);
        }
        if CONNECTION_STATES.iter().any(|s| *s == state) {
            CONNECTION_STATE.with_label_values(&[state]).set(1.0);
        }
    }

    pub fn frame_received(table: &str) {
        FRAMES_TOTAL.with_label_values(&[table]).inc();
    }

    pub fn decode_errors_set(count: u64) {
        DECODE_ERRORS.set(i64::try_from(count).unwrap_or(i64::MAX));
    }

    pub fn handler_error(table: &str) {
        HANDLER_ERRORS_TOTAL.with_label_values(&[table]).inc();
    }

    pub fn ready_set(ready: bool) {
        READY.set(i64::from(ready));
    }

    pub fn net_exposure_set(contracts: i64) {
        NET_EXPOSURE.set(contracts);
    }

    pub fn reference_price_set(price: f64) {
        REFERENCE_PRICE.set(price);
    }

    /// Record an exposure change result by lowercase side (`buy`, `sell`) and
    /// result (`accepted`, `not_ready`, `no_price`, `rejected`, `error`).
    pub fn order_result(side: &str, result: &str) {
        ORDERS_TOTAL.with_label_values(&[side, result]).inc();
    }

    pub fn adapter_restart() {
        ADAPTER_RESTARTS_TOTAL.inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let families = prometheus::gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
