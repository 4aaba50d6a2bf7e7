//! Deterministic feature-hashing embedder

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use super::{EmbeddingInput, EmbeddingProvider};
use crate::error::{Error, Result};

/// Offline embedder that hashes words into a fixed number of buckets
///
/// Texts sharing words get similar vectors, which is enough for tests and for
/// running the pipeline without a model server. Vectors are L2-normalised;
/// input without any words maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(Error::config("embedding dimensions must be at least 1"));
        }
        Ok(Self { dimensions })
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8]) {
        let digest = Sha256::digest(feature);
        let bucket = u64::from_le_bytes([
            digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6], digest[7],
        ]) as usize
            % self.dimensions;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }

    fn vectorize(&self, input: EmbeddingInput<'_>) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        match input {
            EmbeddingInput::Text(text) => {
                for word in text.unicode_words() {
                    self.add_feature(&mut vector, word.to_lowercase().as_bytes());
                }
            }
            EmbeddingInput::TokenIds(ids) => {
                for id in ids {
                    self.add_feature(&mut vector, &id.to_le_bytes());
                }
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, input: EmbeddingInput<'_>) -> Result<Vec<f32>> {
        Ok(self.vectorize(input))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::cosine_similarity;

    #[tokio::test]
    async fn test_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let a = embedder.embed_text("Paris is the capital of France.").await.unwrap();
        let b = embedder.embed_text("paris IS the capital of france").await.unwrap();

        assert_eq!(a.len(), 64);
        assert_eq!(a, b);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_words_score_higher() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let doc = embedder.embed_text("Paris is the capital of France.").await.unwrap();
        let related = embedder.embed_text("What is the capital of France?").await.unwrap();
        let unrelated = embedder.embed_text("Rust borrow checker lifetimes").await.unwrap();

        assert!(cosine_similarity(&doc, &related) > cosine_similarity(&doc, &unrelated));
    }

    #[tokio::test]
    async fn test_token_ids_and_empty_input() {
        let embedder = HashingEmbedder::new(16).unwrap();
        let ids = embedder.embed(EmbeddingInput::TokenIds(&[1, 2, 3])).await.unwrap();
        assert_eq!(ids.len(), 16);

        let empty = embedder.embed_text("  ").await.unwrap();
        assert!(empty.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(HashingEmbedder::new(0).is_err());
    }
}
