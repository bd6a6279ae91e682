//! The reliability envelope: wraps a fallible async call to one named
//! phase (search, graph, cache, storage) with a timeout, bounded retries with
//! exponential backoff, and a circuit breaker, absorbing transient and
//! timeout failures within the configured limits and letting everything else
//! surface unchanged.

use codeintel_core::config::ReliabilityPhaseConfig;
use codeintel_core::error::{CodeIntelError, ErrorKind, ReliabilityError};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};

/// A named phase the reliability envelope guards. Each phase owns its own
/// circuit breaker and timeout/retry budget.
pub struct ReliabilityPolicy {
    phase: &'static str,
    config: ReliabilityPhaseConfig,
    breaker: CircuitBreaker,
}

impl ReliabilityPolicy {
    pub fn new(phase: &'static str, config: ReliabilityPhaseConfig) -> Self {
        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.breaker_failure_threshold,
            success_threshold: config.breaker_success_threshold,
            recovery_timeout: Duration::from_secs(config.breaker_recovery_window_secs),
        });
        Self {
            phase,
            config,
            breaker,
        }
    }

    pub fn phase(&self) -> &'static str {
        self.phase
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `operation`, retrying on retryable errors up to
    /// `config.retry_attempts` times with exponential backoff, subject to
    /// `config.timeout_ms` per attempt and the phase's circuit breaker.
    pub async fn call<F, Fut, T>(&self, mut operation: F) -> Result<T, CodeIntelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CodeIntelError>>,
    {
        if !self.breaker.is_allowed() {
            return Err(ReliabilityError::CircuitOpen {
                phase: self.phase.to_string(),
            }
            .into());
        }

        let mut attempt = 0u32;
        let max_attempts = self.config.retry_attempts.max(1);
        let timeout = Duration::from_millis(self.config.timeout_ms);

        loop {
            attempt += 1;
            let result = tokio::time::timeout(timeout, operation()).await;

            let outcome = match result {
                Ok(inner) => inner,
                Err(_) => {
                    warn!(phase = self.phase, attempt, "reliability phase timed out");
                    Err(ReliabilityError::DeadlineExceeded {
                        phase: self.phase.to_string(),
                    }
                    .into())
                }
            };

            match outcome {
                Ok(value) => {
                    self.breaker.record_success();
                    return Ok(value);
                }
                Err(err) => {
                    let retryable = err.kind().is_retryable();
                    self.breaker.record_failure();

                    if !retryable || attempt >= max_attempts {
                        if retryable {
                            return Err(ReliabilityError::RetriesExhausted {
                                phase: self.phase.to_string(),
                                attempts: attempt,
                            }
                            .into());
                        }
                        return Err(err);
                    }

                    let base = self.config.retry_base_backoff_ms * 2u64.pow(attempt - 1);
                    let jitter = rand::random::<f64>() * base as f64 * 0.25;
                    let backoff = base + jitter as u64;
                    debug!(
                        phase = self.phase,
                        attempt,
                        backoff_ms = backoff,
                        "retrying after transient failure"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
            }
        }
    }
}

/// Whether an error kind would be absorbed by a reliability envelope rather
/// than immediately surfacing to the caller.
pub fn is_absorbable(kind: ErrorKind) -> bool {
    kind.is_retryable() && !kind.always_surfaces()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeintel_core::error::StorageError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn phase_config() -> ReliabilityPhaseConfig {
        ReliabilityPhaseConfig {
            timeout_ms: 200,
            retry_attempts: 3,
            retry_base_backoff_ms: 1,
            breaker_failure_threshold: 10,
            breaker_success_threshold: 2,
            breaker_recovery_window_secs: 30,
        }
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let policy = ReliabilityPolicy::new("storage", phase_config());
        let result: Result<i32, CodeIntelError> = policy.call(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let policy = ReliabilityPolicy::new("storage", phase_config());
        let attempts = AtomicU32::new(0);
        let result: Result<i32, CodeIntelError> = policy
            .call(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(StorageError::Unavailable {
                            reason: "flaky".into(),
                        }
                        .into())
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn invalid_input_never_retries() {
        let policy = ReliabilityPolicy::new("storage", phase_config());
        let attempts = AtomicU32::new(0);
        let result: Result<i32, CodeIntelError> = policy
            .call(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(StorageError::Conflict {
                        entity: "span",
                        reason: "bad input".into(),
                    }
                    .into())
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_retries_exhausted() {
        let policy = ReliabilityPolicy::new("storage", phase_config());
        let result: Result<i32, CodeIntelError> = policy
            .call(|| async {
                Err(StorageError::Unavailable {
                    reason: "down".into(),
                }
                .into())
            })
            .await;
        assert!(matches!(
            result,
            Err(CodeIntelError::Reliability(ReliabilityError::RetriesExhausted { .. }))
        ));
    }
}
