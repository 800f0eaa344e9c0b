//! Prometheus metrics and structured logging for the ibx agent.
//!
//! - Counters for request correlation, protocol anomalies, and order flow
//! - Structured JSON logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
