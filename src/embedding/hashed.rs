//! Deterministic hash-bucket embeddings.
//!
//! No model download, no I/O: each whitespace token is hashed into a
//! bucket and the vector is L2-normalized. Texts sharing tokens land in
//! shared buckets, so cosine similarity still tracks lexical overlap.
//! Useful for tests and for air-gapped machines where the ONNX model
//! cache is unavailable.

use super::{EmbeddingProvider, EmbeddingResult};
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

/// Default vector width. Wide enough that typical guideline vocabularies
/// rarely collide, small enough to keep sidecar files compact.
pub const DEFAULT_DIMENSIONS: usize = 256;

/// Deterministic token-hashing embedder.
#[derive(Debug, Clone)]
pub struct HashedEmbedder {
    dimensions: usize,
}

impl HashedEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut values = vec![0.0f32; self.dimensions];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let digest = hasher.finish();
            let index = (digest as usize) % self.dimensions;
            let weight = (((digest >> 32) as u32) as f32) / (u32::MAX as f32);
            // Base term keeps repeated tokens accumulating in one direction.
            values[index] += 0.5 + weight;
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for value in &mut values {
                *value /= norm;
            }
        }
        values
    }
}

impl Default for HashedEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl EmbeddingProvider for HashedEmbedder {
    fn model_id(&self) -> String {
        format!("hashed:xx64:d{}", self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_deterministic_across_calls() {
        let embedder = HashedEmbedder::default();
        let first = embedder.embed("haemoptysis in smokers over 40").unwrap();
        let second = embedder.embed("haemoptysis in smokers over 40").unwrap();
        assert_eq!(first, second, "same text should embed identically");
    }

    #[test]
    fn test_vectors_are_unit_length() {
        let embedder = HashedEmbedder::default();
        let vector = embedder.embed("unexplained weight loss").unwrap();
        let norm = dot(&vector, &vector).sqrt();
        assert!((norm - 1.0).abs() < 1e-5, "norm was {norm}");
    }

    #[test]
    fn test_shared_tokens_score_higher() {
        let embedder = HashedEmbedder::default();
        let query = embedder.embed("persistent cough weight loss").unwrap();
        let related = embedder.embed("cough and weight loss in adults").unwrap();
        let unrelated = embedder.embed("renal ultrasound scheduling").unwrap();
        assert!(
            dot(&query, &related) > dot(&query, &unrelated),
            "overlapping vocabulary should out-score disjoint vocabulary"
        );
    }

    #[test]
    fn test_case_insensitive_tokens() {
        let embedder = HashedEmbedder::default();
        let lower = embedder.embed("dysphagia referral").unwrap();
        let mixed = embedder.embed("Dysphagia REFERRAL").unwrap();
        assert_eq!(lower, mixed);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashedEmbedder::new(16);
        let vector = embedder.embed("   ").unwrap();
        assert_eq!(vector.len(), 16);
        assert!(vector.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_batch_preserves_order() {
        let embedder = HashedEmbedder::default();
        let batch = embedder.embed_batch(&["first text", "second text"]).unwrap();
        assert_eq!(batch[0], embedder.embed("first text").unwrap());
        assert_eq!(batch[1], embedder.embed("second text").unwrap());
    }

    #[test]
    fn test_dimension_floor_is_one() {
        let embedder = HashedEmbedder::new(0);
        assert_eq!(embedder.dimensions(), 1);
    }
}
