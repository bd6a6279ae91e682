//! Builders, fixtures, and proptest strategies shared across the workspace's
//! test suites.
//!
//! Three modules, mirroring how the rest of the crate is organized:
//! [`generators`] holds proptest strategies for data-model types, [`fixtures`]
//! holds plain builder functions for the common cases a unit test wants
//! without pulling in proptest, and [`assertions`] holds `#[track_caller]`
//! helpers for asserting on [`codeintel_core::error::CodeIntelError`] and
//! well-formedness checks.

pub mod assertions;
pub mod fixtures;
pub mod generators;

pub use codeintel_storage::InMemoryStorage;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn minimal_span_is_well_formed() {
        let span = fixtures::minimal_span("acme/widgets", "src/lib.rs", "parse");
        assertions::assert_span_well_formed(&span);
    }

    #[test]
    fn empty_bundle_is_well_formed() {
        let bundle = fixtures::empty_bundle("how does parsing work", 4_000);
        assertions::assert_bundle_well_formed(&bundle);
        assertions::assert_within_token_budget(&bundle);
    }

    #[test]
    fn permissive_policy_is_well_formed() {
        assertions::assert_policy_well_formed(&fixtures::permissive_policy());
    }

    proptest! {
        #[test]
        fn arb_span_is_always_well_formed(span in generators::arb_span()) {
            prop_assert!(span.is_well_formed());
        }

        #[test]
        fn arb_chunk_byte_range_is_nonempty(chunk in generators::arb_chunk()) {
            prop_assert!(chunk.byte_start < chunk.byte_end);
            prop_assert!(!chunk.content.is_empty());
        }

        #[test]
        fn arb_policy_respects_seed_weight_ceiling(policy in generators::arb_policy()) {
            prop_assert!(policy.is_well_formed());
        }
    }
}
