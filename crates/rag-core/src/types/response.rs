//! Search and answer types

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::fragment::Fragment;

/// A ranked retrieval hit, produced fresh per query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The hydrated fragment
    pub fragment: Fragment,
    /// Cosine similarity to the query (-1.0..=1.0, higher is better)
    pub score: f32,
    /// Stored embedding, only when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

/// Options for a search query
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of results
    pub top_k: usize,
    /// Copy the stored embedding into each result
    pub include_embeddings: bool,
    /// Drop results scoring below this value
    pub min_score: Option<f32>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            include_embeddings: false,
            min_score: None,
        }
    }
}

impl SearchOptions {
    pub fn top_k(top_k: usize) -> Self {
        Self {
            top_k,
            ..Default::default()
        }
    }
}

/// Options for answering a question
#[derive(Debug, Clone)]
pub struct RagOptions {
    /// Number of fragments to retrieve (default: 4)
    pub top_k: usize,
    /// Template with `{context}` and `{question}` placeholders
    pub prompt_template: Option<String>,
    /// Upper bound on the LLM callback
    pub timeout: Option<Duration>,
}

impl Default for RagOptions {
    fn default() -> Self {
        Self {
            top_k: 4,
            prompt_template: None,
            timeout: None,
        }
    }
}

impl RagOptions {
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.prompt_template = Some(template.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Answer plus the fragments it was grounded on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagResponse {
    /// Generated answer, trimmed
    pub answer: String,
    /// Retrieved fragments in rank order
    pub sources: Vec<Fragment>,
    /// Callback output as returned
    pub raw_llm_result: String,
}
