//! Hybrid retrieval: intent classification, policy derivation, weighted
//! rank fusion over parallel seed searches, budget-bounded graph
//! expansion, progressive degradation, and token-budgeted bundle
//! assembly.

pub mod assembler;
pub mod degrade;
pub mod fusion;
pub mod graph;
pub mod intent;
pub mod orchestrator;
pub mod policy;

pub use assembler::{assemble, AssembleLimits, AssemblerItem, ContentType, SourceBucket};
pub use degrade::{degrade, degrade_to_fit, Capsule, DegradedItem, MAX_DEGRADE_LEVEL};
pub use fusion::{fuse, FusedResult, SourceList};
pub use graph::{traverse, ExpansionOrder, GraphTraversalOutput, VisitedSpan};
pub use intent::{classify, DEFAULT_CONFIDENCE_FLOOR};
pub use orchestrator::{
    AssembleOptions, HybridRetrieval, QueryEmbedder, RankedResult, SearchOptions,
};
pub use policy::derive_policy;
