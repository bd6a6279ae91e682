//! `#[track_caller]` assertion helpers for the error taxonomy and the
//! well-formedness invariants on the data model.

use codeintel_core::error::{CodeIntelError, ErrorKind};
use codeintel_core::model::{Bundle, Policy, Span};

#[track_caller]
pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>) -> T {
    match result {
        Ok(v) => v,
        Err(e) => panic!("expected Ok, got Err({e:?})"),
    }
}

#[track_caller]
pub fn assert_err<T: std::fmt::Debug>(result: Result<T, CodeIntelError>) -> CodeIntelError {
    match result {
        Err(e) => e,
        Ok(v) => panic!("expected Err, got Ok({v:?})"),
    }
}

#[track_caller]
pub fn assert_error_kind<T: std::fmt::Debug>(result: Result<T, CodeIntelError>, kind: ErrorKind) {
    let err = assert_err(result);
    assert_eq!(err.kind(), kind, "expected error kind {kind:?}, got {err}");
}

#[track_caller]
pub fn assert_not_found<T: std::fmt::Debug>(result: Result<T, CodeIntelError>) {
    assert_error_kind(result, ErrorKind::NotFound);
}

#[track_caller]
pub fn assert_retryable(err: &CodeIntelError) {
    assert!(err.kind().is_retryable(), "expected a retryable error, got {err}");
}

#[track_caller]
pub fn assert_always_surfaces(err: &CodeIntelError) {
    assert!(
        err.kind().always_surfaces(),
        "expected an error that always surfaces, got {err}"
    );
}

#[track_caller]
pub fn assert_span_well_formed(span: &Span) {
    assert!(span.is_well_formed(), "span {:?} is not well-formed", span.id);
}

#[track_caller]
pub fn assert_policy_well_formed(policy: &Policy) {
    assert!(policy.is_well_formed(), "policy is not well-formed: {policy:?}");
}

#[track_caller]
pub fn assert_bundle_well_formed(bundle: &Bundle) {
    assert!(
        bundle.is_well_formed(),
        "bundle for query {:?} is not well-formed: total_tokens={}, budget={}",
        bundle.query,
        bundle.total_tokens,
        bundle.budget,
    );
}

#[track_caller]
pub fn assert_within_token_budget(bundle: &Bundle) {
    assert!(
        bundle.total_tokens <= bundle.budget || bundle.explanation.overridden_budget,
        "bundle exceeded its token budget: {} > {}",
        bundle.total_tokens,
        bundle.budget,
    );
}

#[track_caller]
pub fn assert_valid_embedding(embedding: &codeintel_core::model::Embedding) {
    assert!(embedding.is_valid(), "embedding vector length does not match its declared dim");
}
