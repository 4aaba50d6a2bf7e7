//! Unicode word-boundary tokenizer

use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;

use super::{Encoding, Tokenizer};
use crate::error::Result;

/// Word tokenizer without a vocabulary
///
/// Tokens are the non-whitespace word-boundary segments of the text; ids are
/// the first four bytes of the token's SHA-256, so they are stable across
/// processes.
#[derive(Debug, Clone, Default)]
pub struct WordTokenizer {
    max_sequence_length: usize,
}

impl WordTokenizer {
    /// Create a word tokenizer (`0` disables truncation)
    pub fn new(max_sequence_length: usize) -> Self {
        Self { max_sequence_length }
    }

    /// Stable id for a token string
    pub fn token_id(token: &str) -> u32 {
        let digest = Sha256::digest(token.as_bytes());
        u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
    }
}

impl Tokenizer for WordTokenizer {
    fn tokenize(&self, text: &str) -> Result<Encoding> {
        let mut encoding = Encoding::default();

        for (start, segment) in text.split_word_bound_indices() {
            if segment.trim().is_empty() {
                continue;
            }
            encoding.token_ids.push(Self::token_id(segment));
            encoding.tokens.push(segment.to_string());
            encoding.offsets.push((start, start + segment.len()));
        }

        Ok(encoding)
    }

    fn max_sequence_length(&self) -> usize {
        self.max_sequence_length
    }

    fn name(&self) -> &str {
        "word"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_and_offsets() {
        let tokenizer = WordTokenizer::default();
        let text = "Paris is the capital of France.";
        let encoding = tokenizer.tokenize(text).unwrap();

        assert_eq!(
            encoding.tokens,
            vec!["Paris", "is", "the", "capital", "of", "France", "."]
        );
        for (token, (start, end)) in encoding.tokens.iter().zip(&encoding.offsets) {
            assert_eq!(&text[*start..*end], token);
        }
    }

    #[test]
    fn test_ids_are_stable() {
        let tokenizer = WordTokenizer::default();
        let a = tokenizer.encode_to_ids("hello world").unwrap();
        let b = tokenizer.encode_to_ids("hello world").unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0], WordTokenizer::token_id("hello"));
    }

    #[test]
    fn test_whitespace_only() {
        let tokenizer = WordTokenizer::default();
        assert!(tokenizer.tokenize("   \n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_multibyte_offsets() {
        let tokenizer = WordTokenizer::default();
        let text = "naïve café über";
        let encoding = tokenizer.tokenize(text).unwrap();
        assert_eq!(encoding.tokens, vec!["naïve", "café", "über"]);
        let (start, end) = encoding.offsets[1];
        assert_eq!(&text[start..end], "café");
    }
}
