//! Correlation ID generation and propagation.
//!
//! Every request is assigned a correlation ID which is attached to all
//! downstream structured logs and, where applicable, metric labels.

use std::fmt;
use uuid::Uuid;

/// Opaque per-request correlation ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh correlation ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an externally supplied ID, e.g. propagated from an upstream
    /// caller's header.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for CorrelationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Open a tracing span carrying the correlation ID, to be entered for the
/// duration of one request's processing.
pub fn request_span(correlation_id: CorrelationId, query_summary: &str) -> tracing::Span {
    tracing::info_span!(
        "codeintel_request",
        correlation_id = %correlation_id,
        query = %query_summary,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_unique() {
        assert_ne!(CorrelationId::new(), CorrelationId::new());
    }

    #[test]
    fn correlation_id_roundtrips_through_string() {
        let id = CorrelationId::new();
        let text = id.to_string();
        let parsed: CorrelationId = text.parse().expect("valid uuid should parse");
        assert_eq!(id, parsed);
    }
}
