//! A deterministic, dependency-free stand-in for a real embedding provider.
//!
//! Embedding providers are an explicit external collaborator the retrieval
//! pipeline treats as a plug-in point (see [`codeintel_retrieval::QueryEmbedder`]);
//! this hashing-trick implementation lets the server run end to end with no
//! model dependency. Swap it for a real provider by implementing the same
//! trait.

use async_trait::async_trait;
use codeintel_core::error::CodeIntelError;
use codeintel_retrieval::QueryEmbedder;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

const DIMENSIONS: usize = 256;

/// Hashes each token into a fixed-width float vector and L2-normalizes it.
/// Not semantically meaningful; exists purely so lexical and vector search
/// can both run against the in-memory reference store.
pub struct HashingEmbedder {
    model_id: String,
}

impl HashingEmbedder {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new("hashing-trick-v1")
    }
}

#[async_trait]
impl QueryEmbedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CodeIntelError> {
        let mut vector = vec![0f32; DIMENSIONS];
        for token in text.split_whitespace() {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % DIMENSIONS;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vector.iter_mut() {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
