//! Query embedding, index lookup and fragment hydration

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::types::{Fragment, SearchOptions, SearchResult};

/// Embeds queries and returns ranked, hydrated fragments
#[derive(Clone)]
pub struct SearchService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
}

impl SearchService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    /// Top `top_k` fragments for `text`
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchResult>> {
        self.query_with(text, &SearchOptions::top_k(top_k), &CancellationToken::new())
            .await
    }

    /// Search with explicit options and a cancellation token
    ///
    /// Results are in rank order. An empty index yields no results without
    /// calling the embedding provider.
    pub async fn query_with(
        &self,
        text: &str,
        options: &SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if options.top_k == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            embedding = self.embedder.embed_text(text) => embedding?,
        };

        let matches = self.index.query(&embedding, options.top_k)?;

        let results: Vec<SearchResult> = matches
            .into_iter()
            .filter(|m| options.min_score.map_or(true, |min| m.score >= min))
            .map(|m| SearchResult {
                fragment: Fragment::from_index_metadata(&m.id, &m.entry.metadata),
                score: m.score,
                embedding: options.include_embeddings.then(|| m.entry.embedding.clone()),
            })
            .collect();

        tracing::debug!(
            "Search returned {} results (top_k={}, provider={})",
            results.len(),
            options.top_k,
            self.embedder.name()
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::embedding::{EmbeddingInput, HashingEmbedder};
    use crate::index::SnapshotIndex;

    /// Counts calls so tests can assert the provider was skipped
    struct CountingEmbedder {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, input: EmbeddingInput<'_>) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(input).await
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn counting() -> Arc<CountingEmbedder> {
        Arc::new(CountingEmbedder {
            inner: HashingEmbedder::new(32).unwrap(),
            calls: AtomicUsize::new(0),
        })
    }

    async fn store(index: &SnapshotIndex, embedder: &HashingEmbedder, fragment: &Fragment) {
        let embedding = embedder.embed_text(&fragment.text).await.unwrap();
        index
            .upsert(&fragment.id, embedding, fragment.to_index_metadata())
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_index_skips_embedding() {
        let embedder = counting();
        let search = SearchService::new(embedder.clone(), Arc::new(SnapshotIndex::default()));

        assert!(search.query("anything", 5).await.unwrap().is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hydrates_in_rank_order() {
        let hashing = HashingEmbedder::new(32).unwrap();
        let index = Arc::new(SnapshotIndex::default());
        let paris = Fragment::new("geo", 0, "Paris is the capital of France.".to_string());
        let rust = Fragment::new("lang", 0, "Rust has a borrow checker.".to_string());
        store(&index, &hashing, &paris).await;
        store(&index, &hashing, &rust).await;

        let search = SearchService::new(Arc::new(hashing), index);
        let options = SearchOptions {
            top_k: 2,
            include_embeddings: true,
            min_score: None,
        };
        let results = search
            .query_with("capital of France", &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].fragment, paris);
        assert!(results[0].score >= results[1].score);
        assert_eq!(results[0].embedding.as_ref().map(Vec::len), Some(32));
    }

    #[tokio::test]
    async fn test_min_score_filters() {
        let hashing = HashingEmbedder::new(32).unwrap();
        let index = Arc::new(SnapshotIndex::default());
        store(&index, &hashing, &Fragment::new("geo", 0, "Paris France".to_string())).await;

        let search = SearchService::new(Arc::new(hashing), index);
        let options = SearchOptions {
            min_score: Some(1.5),
            ..SearchOptions::top_k(3)
        };
        let results = search
            .query_with("Paris France", &options, &CancellationToken::new())
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let embedder = counting();
        let index = Arc::new(SnapshotIndex::default());
        index.upsert("a", vec![1.0; 32], Default::default()).unwrap();
        let search = SearchService::new(embedder.clone(), index);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = search
            .query_with("a", &SearchOptions::default(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_propagates() {
        let index = Arc::new(SnapshotIndex::default());
        index.upsert("a", vec![1.0, 0.0], Default::default()).unwrap();
        let search = SearchService::new(counting(), index);

        let err = search.query("text", 1).await.unwrap_err();
        assert!(err.is_embedding_failure());
    }
}
