//! Configuration for the RAG pipeline
//!
//! Every section has defaults, so an empty TOML file is a valid configuration:
//!
//! ```toml
//! [tokenizer]
//! kind = "huggingface"
//! path = "models/tokenizer.json"
//!
//! [chunking]
//! target_tokens = 200
//! overlap_tokens = 20
//!
//! [vector_index]
//! provider = "disk"
//! storage_path = "data/vectors.json"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::RagOptions;

/// Main pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RagConfig {
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embeddings: EmbeddingConfig,
    #[serde(default)]
    pub vector_index: VectorIndexConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub rag: RagDefaults,
    #[serde(default)]
    pub llm: LlmConfig,
}

impl RagConfig {
    /// Load and validate a TOML configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| Error::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that could never work
    pub fn validate(&self) -> Result<()> {
        if self.chunking.target_tokens == 0 {
            return Err(Error::config("chunking.target_tokens must be at least 1"));
        }
        if self.chunking.overlap_tokens >= self.chunking.target_tokens {
            return Err(Error::config(format!(
                "chunking.overlap_tokens ({}) must be smaller than chunking.target_tokens ({})",
                self.chunking.overlap_tokens, self.chunking.target_tokens
            )));
        }
        if self.chunking.embed_token_ids && self.tokenizer.kind == TokenizerKind::None {
            return Err(Error::config(
                "chunking.embed_token_ids requires a tokenizer",
            ));
        }
        if self.tokenizer.kind == TokenizerKind::Huggingface && self.tokenizer.path.is_none() {
            return Err(Error::config(
                "tokenizer.path is required for the huggingface tokenizer",
            ));
        }
        if !matches!(self.embeddings.provider.as_str(), "hashing" | "ollama") {
            return Err(Error::config(format!(
                "unknown embedding provider '{}' (expected 'hashing' or 'ollama')",
                self.embeddings.provider
            )));
        }
        if self.embeddings.dimensions == 0 {
            return Err(Error::config("embeddings.dimensions must be at least 1"));
        }
        if self.vector_index.provider.trim().is_empty() {
            return Err(Error::config("vector_index.provider must not be empty"));
        }
        if self.ingest.queue_capacity == 0 {
            return Err(Error::config("ingest.queue_capacity must be at least 1"));
        }
        Ok(())
    }
}

/// Which tokenizer backs the chunker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenizerKind {
    /// Character windows, no tokenizer
    None,
    /// Unicode word-boundary tokenizer
    #[default]
    Word,
    /// Hugging Face `tokenizer.json`
    Huggingface,
}

/// Tokenizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    #[serde(default)]
    pub kind: TokenizerKind,
    /// Path to `tokenizer.json` for the huggingface kind
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Truncation length for encode (0 disables)
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,
}

fn default_max_sequence_length() -> usize { 512 }

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            kind: TokenizerKind::default(),
            path: None,
            max_sequence_length: default_max_sequence_length(),
        }
    }
}

/// Text chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Window size in tokens (characters without a tokenizer)
    #[serde(default = "default_target_tokens")]
    pub target_tokens: usize,
    /// Tokens shared by consecutive windows
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    /// Hand token ids instead of text to the embedding provider
    #[serde(default)]
    pub embed_token_ids: bool,
}

fn default_target_tokens() -> usize { 256 }
fn default_overlap_tokens() -> usize { 32 }

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            target_tokens: default_target_tokens(),
            overlap_tokens: default_overlap_tokens(),
            embed_token_ids: false,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// `hashing` (offline) or `ollama`
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    /// Vector size produced by the provider
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

fn default_embedding_provider() -> String { "hashing".to_string() }
fn default_dimensions() -> usize { 384 }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            dimensions: default_dimensions(),
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexConfig {
    /// Registered backend name (`lockfree`, `local`, `disk`, ...)
    #[serde(default = "default_index_provider")]
    pub provider: String,
    /// Backing file for the disk backend
    #[serde(default)]
    pub storage_path: Option<PathBuf>,
    /// Directory handed to backends through the provider context
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
}

fn default_index_provider() -> String { "lockfree".to_string() }

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            storage_path: None,
            storage_root: None,
        }
    }
}

/// Background ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Pending file events kept before the oldest is dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize { 256 }

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Defaults for answering questions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagDefaults {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Template with `{context}` and `{question}` placeholders
    #[serde(default)]
    pub prompt_template: Option<String>,
    /// Upper bound on a single LLM call
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_top_k() -> usize { 4 }

impl Default for RagDefaults {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            prompt_template: None,
            timeout_secs: None,
        }
    }
}

impl RagDefaults {
    /// Options for a single answer call
    pub fn options(&self) -> RagOptions {
        RagOptions {
            top_k: self.top_k,
            prompt_template: self.prompt_template.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// LLM (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Ollama base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Embedding model name
    #[serde(default = "default_embed_model")]
    pub embed_model: String,
    /// Generation model name
    #[serde(default = "default_generate_model")]
    pub generate_model: String,
    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries for failed requests (0 = single attempt)
    #[serde(default)]
    pub max_retries: u32,
}

fn default_base_url() -> String { "http://localhost:11434".to_string() }
fn default_embed_model() -> String { "nomic-embed-text".to_string() }
fn default_generate_model() -> String { "llama3.2".to_string() }
fn default_temperature() -> f32 { 0.3 }
fn default_timeout_secs() -> u64 { 120 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            embed_model: default_embed_model(),
            generate_model: default_generate_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }
}
