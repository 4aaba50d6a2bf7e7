//! Fragment type with source tracking for citations

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Free-form fragment metadata
pub type Metadata = HashMap<String, serde_json::Value>;

const KEY_TEXT: &str = "text";
const KEY_SOURCE: &str = "source";
const KEY_CHUNK_INDEX: &str = "chunk_index";
const KEY_METADATA: &str = "metadata";

/// A chunk of source text plus identity and position
///
/// Fragments are immutable once created. `id` is stable across re-ingestion
/// of the same source, so upserting again replaces rather than duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Stable identifier
    pub id: String,
    /// Fragment text, sliced from the source text
    pub text: String,
    /// Caller-supplied metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Logical source (file path or text id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// 0-based position within the source
    pub chunk_index: usize,
}

impl Fragment {
    /// Create a fragment whose id is derived from source and position
    pub fn new(source: &str, chunk_index: usize, text: String) -> Self {
        Self {
            id: Self::derive_id(source, chunk_index),
            text,
            metadata: None,
            source: Some(source.to_string()),
            chunk_index,
        }
    }

    /// Attach caller metadata
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = if metadata.is_empty() { None } else { Some(metadata) };
        self
    }

    /// Id for the fragment at `chunk_index` of `source`
    pub fn derive_id(source: &str, chunk_index: usize) -> String {
        format!("{}#{}", source, chunk_index)
    }

    /// Source name derived from text content (`text-<16 hex>`)
    pub fn content_source(text: &str) -> String {
        let digest = Sha256::digest(text.as_bytes());
        format!("text-{}", &hex::encode(digest)[..16])
    }

    /// Label used when citing the fragment in a prompt
    pub fn citation_label(&self) -> String {
        match &self.source {
            Some(source) => format!("{}, part {}", source, self.chunk_index + 1),
            None => format!("part {}", self.chunk_index + 1),
        }
    }

    /// Metadata stored alongside the vector in the index
    pub fn to_index_metadata(&self) -> Metadata {
        let mut meta = HashMap::new();
        meta.insert(KEY_TEXT.to_string(), serde_json::json!(self.text));
        meta.insert(KEY_CHUNK_INDEX.to_string(), serde_json::json!(self.chunk_index));

        if let Some(source) = &self.source {
            meta.insert(KEY_SOURCE.to_string(), serde_json::json!(source));
        }

        if let Some(metadata) = &self.metadata {
            meta.insert(KEY_METADATA.to_string(), serde_json::json!(metadata));
        }

        meta
    }

    /// Rebuild a fragment from index metadata
    ///
    /// Missing keys degrade to empty values rather than failing, so entries
    /// upserted directly into the index still hydrate.
    pub fn from_index_metadata(id: &str, meta: &Metadata) -> Self {
        let text = meta
            .get(KEY_TEXT)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        let source = meta
            .get(KEY_SOURCE)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let chunk_index = meta
            .get(KEY_CHUNK_INDEX)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as usize;

        let metadata = meta
            .get(KEY_METADATA)
            .and_then(|v| v.as_object())
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect());

        Self {
            id: id.to_string(),
            text,
            metadata,
            source,
            chunk_index,
        }
    }
}
