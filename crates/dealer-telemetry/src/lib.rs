//! Prometheus metrics and structured logging for the dealer.
//!
//! - Structured logging with tracing, JSON in production
//! - Prometheus metrics for the stream, feeds, readiness and orders

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
