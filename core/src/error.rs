//! Error taxonomy for codeintel operations.
//!
//! Errors are grouped by concern, then composed under a single
//! [`CodeIntelError`]. Each per-domain error additionally classifies itself
//! by the error *kind* from the design's error-handling policy (invalid
//! input, not-found, transient, timeout, capacity, integrity, cancelled) so
//! the reliability envelope can decide what is retryable without matching on
//! variant names.

use thiserror::Error;

/// The error-kind taxonomy the design's propagation policy is defined over.
/// `Capacity` conditions are deliberately excluded here: the design treats
/// budget exhaustion, open circuits, and queue overflow as stopping
/// conditions, not error returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    NotFound,
    Transient,
    Timeout,
    Integrity,
    Cancelled,
}

impl ErrorKind {
    /// Whether the reliability envelope may retry an error of this kind.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::Timeout)
    }

    /// Whether this kind always surfaces rather than being absorbed by the
    /// reliability envelope.
    pub fn always_surfaces(self) -> bool {
        matches!(self, ErrorKind::InvalidInput | ErrorKind::Integrity)
    }
}

/// Storage facade errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("conflict writing {entity}: {reason}")]
    Conflict { entity: &'static str, reason: String },

    #[error("storage backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("storage operation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: i64 },

    #[error("storage integrity violation: {reason}")]
    Integrity { reason: String },

    #[error("transaction aborted: {reason}")]
    TransactionFailed { reason: String },
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::Conflict { .. } => ErrorKind::InvalidInput,
            StorageError::Unavailable { .. } => ErrorKind::Transient,
            StorageError::Timeout { .. } => ErrorKind::Timeout,
            StorageError::Integrity { .. } => ErrorKind::Integrity,
            StorageError::TransactionFailed { .. } => ErrorKind::Transient,
        }
    }
}

/// Retrieval pipeline errors: classification, policy, fusion, graph
/// traversal, and bundle assembly.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("invalid query option: {reason}")]
    InvalidInput { reason: String },

    #[error("retrieval cancelled")]
    Cancelled,

    #[error("retrieval phase '{phase}' timed out")]
    Timeout { phase: String },

    #[error("referenced {entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl RetrievalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrievalError::InvalidInput { .. } => ErrorKind::InvalidInput,
            RetrievalError::Cancelled => ErrorKind::Cancelled,
            RetrievalError::Timeout { .. } => ErrorKind::Timeout,
            RetrievalError::NotFound { .. } => ErrorKind::NotFound,
        }
    }
}

/// Cache fabric errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache backend unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("failed to (de)serialize cache entry: {reason}")]
    Serialization { reason: String },

    #[error("unknown cache namespace: {namespace}")]
    UnknownNamespace { namespace: String },
}

impl CacheError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CacheError::Unavailable { .. } => ErrorKind::Transient,
            CacheError::Serialization { .. } => ErrorKind::Integrity,
            CacheError::UnknownNamespace { .. } => ErrorKind::InvalidInput,
        }
    }
}

/// Reliability envelope errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReliabilityError {
    #[error("circuit open for phase '{phase}'")]
    CircuitOpen { phase: String },

    #[error("exhausted {attempts} attempts for phase '{phase}'")]
    RetriesExhausted { phase: String, attempts: u32 },

    #[error("deadline exceeded for phase '{phase}'")]
    DeadlineExceeded { phase: String },
}

impl ReliabilityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReliabilityError::CircuitOpen { .. } => ErrorKind::Transient,
            ReliabilityError::RetriesExhausted { .. } => ErrorKind::Transient,
            ReliabilityError::DeadlineExceeded { .. } => ErrorKind::Timeout,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("incompatible options: {option_a} and {option_b}")]
    IncompatibleOptions { option_a: String, option_b: String },
}

/// Master error type for all codeintel operations.
#[derive(Debug, Clone, Error)]
pub enum CodeIntelError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("reliability error: {0}")]
    Reliability(#[from] ReliabilityError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

impl CodeIntelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodeIntelError::Storage(e) => e.kind(),
            CodeIntelError::Retrieval(e) => e.kind(),
            CodeIntelError::Cache(e) => e.kind(),
            CodeIntelError::Reliability(e) => e.kind(),
            CodeIntelError::Config(_) => ErrorKind::InvalidInput,
        }
    }
}

/// Result type alias for codeintel operations.
pub type CodeIntelResult<T> = Result<T, CodeIntelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_retryable() {
        let err = StorageError::Unavailable {
            reason: "connection reset".into(),
        };
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn invalid_input_never_surfaces_as_retryable() {
        let err = RetrievalError::InvalidInput {
            reason: "limit out of range".into(),
        };
        assert!(!err.kind().is_retryable());
        assert!(err.kind().always_surfaces());
    }

    #[test]
    fn master_error_composes_from_storage() {
        let err: CodeIntelError = StorageError::Timeout { elapsed_ms: 500 }.into();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
