//! Observability: Prometheus metrics and correlation IDs.

pub mod correlation;
pub mod error;
pub mod metrics;

pub use correlation::{request_span, CorrelationId};
pub use error::TelemetryError;
pub use metrics::{render, CodeIntelMetrics, METRICS};
