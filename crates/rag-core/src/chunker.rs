//! Token-bounded text chunking with overlap

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tokenizer::Tokenizer;
use crate::types::Fragment;

/// Splits text into overlapping windows
///
/// With a tokenizer the windows are measured in tokens and sliced from the
/// original text by token offsets. Without one, windows are measured in
/// characters with the same overlap rules.
#[derive(Clone, Default)]
pub struct Chunker {
    tokenizer: Option<Arc<dyn Tokenizer>>,
}

impl Chunker {
    /// Create a chunker, optionally token-aware
    pub fn new(tokenizer: Option<Arc<dyn Tokenizer>>) -> Self {
        Self { tokenizer }
    }

    /// Character-window chunker
    pub fn by_characters() -> Self {
        Self { tokenizer: None }
    }

    pub fn tokenizer(&self) -> Option<&Arc<dyn Tokenizer>> {
        self.tokenizer.as_ref()
    }

    /// Split text whose source is derived from its content
    pub fn split(
        &self,
        text: &str,
        target_tokens: usize,
        overlap_tokens: usize,
    ) -> Result<Vec<Fragment>> {
        let source = Fragment::content_source(text);
        self.split_source(text, &source, target_tokens, overlap_tokens)
    }

    /// Split text into fragments `"{source}#0"`, `"{source}#1"`, ...
    pub fn split_source(
        &self,
        text: &str,
        source: &str,
        target_tokens: usize,
        overlap_tokens: usize,
    ) -> Result<Vec<Fragment>> {
        let step = window_step(target_tokens, overlap_tokens)?;

        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let ranges = match &self.tokenizer {
            Some(tokenizer) => {
                let encoding = tokenizer.tokenize(text)?;
                token_windows(text, &encoding.offsets, target_tokens, step)
            }
            None => char_windows(text, target_tokens, step),
        };

        let fragments: Vec<Fragment> = ranges
            .into_iter()
            .map(|(start, end)| &text[start..end])
            .filter(|window| !window.trim().is_empty())
            .enumerate()
            .map(|(index, window)| Fragment::new(source, index, window.to_string()))
            .collect();

        tracing::debug!(
            "Split {} bytes from '{}' into {} fragments (target={}, overlap={}, mode={})",
            text.len(),
            source,
            fragments.len(),
            target_tokens,
            overlap_tokens,
            self.tokenizer.as_ref().map_or("chars", |t| t.name()),
        );

        Ok(fragments)
    }
}

/// Advance per window; must be at least one so splitting terminates
fn window_step(target: usize, overlap: usize) -> Result<usize> {
    if target == 0 {
        return Err(Error::config("chunk target size must be at least 1"));
    }
    if overlap >= target {
        return Err(Error::config(format!(
            "chunk overlap ({}) must be smaller than target size ({})",
            overlap, target
        )));
    }
    Ok(target - overlap)
}

/// Byte ranges of token windows
fn token_windows(
    text: &str,
    offsets: &[(usize, usize)],
    target: usize,
    step: usize,
) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut start = 0usize;

    while start < offsets.len() {
        let end = (start + target).min(offsets.len());
        let byte_start = floor_char_boundary(text, offsets[start].0);
        let byte_end = ceil_char_boundary(text, offsets[end - 1].1);
        if byte_start < byte_end {
            ranges.push((byte_start, byte_end));
        }
        if end == offsets.len() {
            break;
        }
        start += step;
    }

    ranges
}

/// Byte ranges of character windows
fn char_windows(text: &str, target: usize, step: usize) -> Vec<(usize, usize)> {
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = boundaries.len() - 1;

    let mut ranges = Vec::new();
    let mut start = 0usize;

    while start < char_count {
        let end = (start + target).min(char_count);
        ranges.push((boundaries[start], boundaries[end]));
        if end == char_count {
            break;
        }
        start += step;
    }

    ranges
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index < text.len() && !text.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::WordTokenizer;
    use proptest::prelude::*;

    fn word_chunker() -> Chunker {
        Chunker::new(Some(Arc::new(WordTokenizer::default())))
    }

    #[test]
    fn test_token_windows_overlap() {
        let text = "a b c d e f g h i j";
        let fragments = word_chunker().split_source(text, "doc", 4, 1).unwrap();

        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["a b c d", "d e f g", "g h i j"]);
        assert_eq!(fragments[2].id, "doc#2");
        assert_eq!(fragments[2].chunk_index, 2);
    }

    #[test]
    fn test_final_window_may_be_short() {
        let fragments = word_chunker().split_source("a b c d e", "doc", 3, 0).unwrap();
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["a b c", "d e"]);
    }

    #[test]
    fn test_char_fallback() {
        let fragments = Chunker::by_characters()
            .split_source("abcdefghij", "doc", 4, 2)
            .unwrap();
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "cdef", "efgh", "ghij"]);
    }

    #[test]
    fn test_char_fallback_multibyte() {
        let fragments = Chunker::by_characters()
            .split_source("ééééé", "doc", 2, 0)
            .unwrap();
        let texts: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn test_empty_and_whitespace_yield_nothing() {
        assert!(word_chunker().split("", 8, 2).unwrap().is_empty());
        assert!(word_chunker().split(" \n\t  ", 8, 2).unwrap().is_empty());
        assert!(Chunker::by_characters().split("    ", 2, 1).unwrap().is_empty());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_target() {
        let err = word_chunker().split("a b c", 3, 3).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(word_chunker().split("a b c", 0, 0).is_err());
    }

    #[test]
    fn test_split_derives_ids_from_content() {
        let a = word_chunker().split("same text here", 2, 0).unwrap();
        let b = word_chunker().split("same text here", 2, 0).unwrap();
        assert_eq!(a, b);
        assert!(a[0].id.starts_with("text-"));
    }

    proptest! {
        #[test]
        fn prop_windows_bounded_and_overlapping(
            words in proptest::collection::vec("[a-z]{1,6}", 0..60),
            target in 1usize..12,
            overlap_seed in 0usize..12,
        ) {
            let overlap = overlap_seed % target;
            let text = words.join(" ");
            let tokenizer = WordTokenizer::default();
            let fragments = word_chunker().split_source(&text, "p", target, overlap).unwrap();

            let mut previous: Option<Vec<String>> = None;
            for (i, fragment) in fragments.iter().enumerate() {
                prop_assert_eq!(fragment.chunk_index, i);
                let tokens = tokenizer.tokenize(&fragment.text).unwrap().tokens;
                prop_assert!(tokens.len() <= target);

                if let Some(prev) = &previous {
                    // The next window starts `overlap` tokens before the previous end.
                    let shared = &prev[prev.len() - overlap..];
                    prop_assert_eq!(&tokens[..overlap], shared);
                }
                previous = Some(tokens);
            }

            let expected = if words.is_empty() {
                0
            } else if words.len() <= target {
                1
            } else {
                (words.len() - overlap + (target - overlap) - 1) / (target - overlap)
            };
            prop_assert_eq!(fragments.len(), expected);
        }
    }
}
