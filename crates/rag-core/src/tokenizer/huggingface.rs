//! Hugging Face `tokenizer.json` backend

use std::path::Path;

use super::{Encoding, Tokenizer};
use crate::error::{Error, Result};

/// Tokenizer loaded from a Hugging Face `tokenizer.json`
///
/// The file's own truncation and padding settings are cleared so that the
/// whole text is encoded; truncation is governed by `max_sequence_length`.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    max_sequence_length: usize,
}

impl HfTokenizer {
    /// Load a tokenizer from file
    pub fn from_file(path: impl AsRef<Path>, max_sequence_length: usize) -> Result<Self> {
        let path = path.as_ref();
        let inner = tokenizers::Tokenizer::from_file(path).map_err(|e| {
            Error::tokenization(format!("Failed to load tokenizer from {}: {}", path.display(), e))
        })?;
        Self::from_tokenizer(inner, max_sequence_length)
    }

    /// Load a tokenizer from in-memory JSON
    pub fn from_bytes(bytes: &[u8], max_sequence_length: usize) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_bytes(bytes)
            .map_err(|e| Error::tokenization(format!("Failed to parse tokenizer: {}", e)))?;
        Self::from_tokenizer(inner, max_sequence_length)
    }

    fn from_tokenizer(mut inner: tokenizers::Tokenizer, max_sequence_length: usize) -> Result<Self> {
        inner
            .with_truncation(None)
            .map_err(|e| Error::tokenization(format!("Failed to disable truncation: {}", e)))?;
        inner.with_padding(None);

        tracing::debug!("Loaded tokenizer (max_sequence_length={})", max_sequence_length);

        Ok(Self {
            inner,
            max_sequence_length,
        })
    }
}

impl Tokenizer for HfTokenizer {
    fn tokenize(&self, text: &str) -> Result<Encoding> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::tokenization(e.to_string()))?;

        Ok(Encoding {
            token_ids: encoding.get_ids().to_vec(),
            tokens: encoding.get_tokens().to_vec(),
            offsets: encoding.get_offsets().to_vec(),
        })
    }

    fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}
