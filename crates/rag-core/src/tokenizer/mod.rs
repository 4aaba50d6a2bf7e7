//! Text tokenization with optional truncation
//!
//! Two backends: [`HfTokenizer`] wraps a Hugging Face `tokenizer.json`, and
//! [`WordTokenizer`] splits on Unicode word boundaries when no model files are
//! around. Both report byte offsets so callers can slice the original text.

mod huggingface;
mod word;

use std::sync::Arc;

use crate::error::Result;

pub use huggingface::HfTokenizer;
pub use word::WordTokenizer;

/// Token ids, token strings and byte offsets of an encoded text
///
/// All three vectors always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encoding {
    pub token_ids: Vec<u32>,
    pub tokens: Vec<String>,
    /// `(start, end)` byte range of each token in the input
    pub offsets: Vec<(usize, usize)>,
}

impl Encoding {
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Keep at most `max_len` tokens from the start; `max_len < 1` keeps all
    pub fn truncate(&mut self, max_len: usize) {
        if max_len >= 1 && self.token_ids.len() > max_len {
            self.token_ids.truncate(max_len);
            self.tokens.truncate(max_len);
            self.offsets.truncate(max_len);
        }
    }
}

/// Trait for text tokenizers
///
/// Implementations only provide [`Tokenizer::tokenize`]; truncation is applied
/// uniformly by [`Tokenizer::encode`].
pub trait Tokenizer: Send + Sync {
    /// Encode the whole text, never truncated
    fn tokenize(&self, text: &str) -> Result<Encoding>;

    /// Configured truncation length (`0` disables truncation)
    fn max_sequence_length(&self) -> usize;

    /// Get tokenizer name for logging
    fn name(&self) -> &str;

    /// Encode and truncate to `max_sequence_length`
    fn encode(&self, text: &str) -> Result<Encoding> {
        let mut encoding = self.tokenize(text)?;
        encoding.truncate(self.max_sequence_length());
        Ok(encoding)
    }

    /// Encode and return only the (truncated) ids
    fn encode_to_ids(&self, text: &str) -> Result<Vec<u32>> {
        Ok(self.encode(text)?.token_ids)
    }
}

/// Non-blocking [`Tokenizer::encode`], run on the blocking pool
///
/// Same truncation and ordering as the synchronous call.
pub async fn encode_async(tokenizer: Arc<dyn Tokenizer>, text: String) -> Result<Encoding> {
    tokio::task::spawn_blocking(move || tokenizer.encode(&text)).await?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(n: usize) -> Encoding {
        Encoding {
            token_ids: (0..n as u32).collect(),
            tokens: (0..n).map(|i| format!("t{}", i)).collect(),
            offsets: (0..n).map(|i| (i * 3, i * 3 + 2)).collect(),
        }
    }

    #[test]
    fn test_truncate_keeps_leading_tokens() {
        let mut encoding = sample(10);
        encoding.truncate(4);
        assert_eq!(encoding.token_ids, vec![0, 1, 2, 3]);
        assert_eq!(encoding.tokens.len(), 4);
        assert_eq!(encoding.offsets.len(), 4);
    }

    #[test]
    fn test_truncate_disabled_below_one() {
        let mut encoding = sample(10);
        encoding.truncate(0);
        assert_eq!(encoding.len(), 10);
    }

    #[tokio::test]
    async fn test_encode_async_matches_sync() {
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(WordTokenizer::new(3));
        let text = "one two three four five".to_string();

        let sync = tokenizer.encode(&text).unwrap();
        let async_result = encode_async(tokenizer.clone(), text).await.unwrap();

        assert_eq!(sync, async_result);
        assert_eq!(async_result.tokens, vec!["one", "two", "three"]);
    }
}
