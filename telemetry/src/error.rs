//! Telemetry-layer errors: metric registration and encoding failures.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TelemetryError {
    #[error("failed to register metric: {reason}")]
    Register { reason: String },

    #[error("failed to encode metrics: {reason}")]
    Encode { reason: String },
}

impl TelemetryError {
    pub fn register(err: prometheus::Error) -> Self {
        TelemetryError::Register {
            reason: err.to_string(),
        }
    }
}
