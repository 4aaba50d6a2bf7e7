//! Embedding provider trait and built-in providers

mod hashing;
mod ollama;

use async_trait::async_trait;

use crate::error::Result;

pub use hashing::HashingEmbedder;
pub use ollama::OllamaEmbedder;

/// What gets embedded: raw text or pre-tokenized ids
#[derive(Debug, Clone, Copy)]
pub enum EmbeddingInput<'a> {
    Text(&'a str),
    TokenIds(&'a [u32]),
}

/// Trait for embedding providers
///
/// Every call on one provider must return vectors of [`dimensions`] length;
/// the vector index rejects anything else.
///
/// [`dimensions`]: EmbeddingProvider::dimensions
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding
    async fn embed(&self, input: EmbeddingInput<'_>) -> Result<Vec<f32>>;

    /// Generate an embedding for text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(EmbeddingInput::Text(text)).await
    }

    /// Generate embeddings for multiple texts
    ///
    /// Default implementation calls `embed` sequentially.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(EmbeddingInput::Text(text)).await?);
        }
        Ok(embeddings)
    }

    /// Fixed vector size
    fn dimensions(&self) -> usize;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
