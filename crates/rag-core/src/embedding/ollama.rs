//! Ollama embedding provider

use async_trait::async_trait;
use std::sync::Arc;

use super::{EmbeddingInput, EmbeddingProvider};
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::generation::OllamaClient;

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &LlmConfig, dimensions: usize) -> Result<Self> {
        Ok(Self {
            client: Arc::new(OllamaClient::new(config)?),
            dimensions,
        })
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, dimensions: usize) -> Self {
        Self { client, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, input: EmbeddingInput<'_>) -> Result<Vec<f32>> {
        let text = match input {
            EmbeddingInput::Text(text) => text,
            EmbeddingInput::TokenIds(_) => {
                return Err(Error::embedding("ollama embedder only accepts text input"))
            }
        };

        let embedding = self.client.embed(text).await?;
        if embedding.len() != self.dimensions {
            return Err(Error::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
