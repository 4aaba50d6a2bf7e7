//! Explicit wiring of every service from a [`RagConfig`]

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::chunker::Chunker;
use crate::config::{RagConfig, TokenizerKind};
use crate::embedding::{EmbeddingProvider, HashingEmbedder, OllamaEmbedder};
use crate::error::{Error, Result};
use crate::generation::RagService;
use crate::index::{ProviderContext, VectorIndex, VectorIndexOptions, VectorIndexRegistry};
use crate::ingest::{
    ContentIndexer, DocumentConverter, FileConverter, FileEvent, IndexerStats, IngestOptions,
    IngestQueue, IngestService,
};
use crate::retrieval::SearchService;
use crate::tokenizer::{HfTokenizer, Tokenizer, WordTokenizer};
use crate::types::RagOptions;

/// Caller-supplied components; anything left `None` is built from the config
#[derive(Default, Clone)]
pub struct Collaborators {
    pub tokenizer: Option<Arc<dyn Tokenizer>>,
    pub embedder: Option<Arc<dyn EmbeddingProvider>>,
    pub converter: Option<Arc<dyn DocumentConverter>>,
    pub registry: Option<Arc<VectorIndexRegistry>>,
}

/// Fully wired ingest, search and answer services sharing one index
#[derive(Clone)]
pub struct RagPipeline {
    config: RagConfig,
    index: Arc<dyn VectorIndex>,
    ingest: IngestService,
    search: SearchService,
    rag: RagService,
}

impl RagPipeline {
    /// Build every service; unknown backend names fail here, not on first use
    pub fn from_config(config: &RagConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;

        let tokenizer = match collaborators.tokenizer {
            Some(tokenizer) => Some(tokenizer),
            None => build_tokenizer(config)?,
        };

        let embedder = match collaborators.embedder {
            Some(embedder) => embedder,
            None => build_embedder(config)?,
        };

        let registry = collaborators
            .registry
            .unwrap_or_else(|| Arc::new(VectorIndexRegistry::with_defaults()));
        let options = VectorIndexOptions {
            dimensions: Some(embedder.dimensions()),
            storage_path: config.vector_index.storage_path.clone(),
        };
        let context = ProviderContext {
            storage_root: config.vector_index.storage_root.clone(),
        };
        let index = registry.create(&config.vector_index.provider, &options, Some(&context))?;

        let converter = collaborators
            .converter
            .unwrap_or_else(|| Arc::new(FileConverter::new()));

        let ingest = IngestService::new(
            Chunker::new(tokenizer),
            Arc::clone(&embedder),
            Arc::clone(&index),
            converter,
            IngestOptions {
                target_tokens: config.chunking.target_tokens,
                overlap_tokens: config.chunking.overlap_tokens,
                embed_token_ids: config.chunking.embed_token_ids,
            },
        )?;
        let search = SearchService::new(Arc::clone(&embedder), Arc::clone(&index));
        let rag = RagService::new(search.clone());

        tracing::info!(
            "RAG pipeline ready: index={}, embeddings={} ({}d), tokenizer={:?}",
            index.name(),
            embedder.name(),
            embedder.dimensions(),
            config.tokenizer.kind
        );

        Ok(Self {
            config: config.clone(),
            index,
            ingest,
            search,
            rag,
        })
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn ingest(&self) -> &IngestService {
        &self.ingest
    }

    pub fn search(&self) -> &SearchService {
        &self.search
    }

    pub fn rag(&self) -> &RagService {
        &self.rag
    }

    /// Answer options from the `[rag]` section
    pub fn rag_options(&self) -> RagOptions {
        self.config.rag.options()
    }

    /// Start a content indexer on a fresh queue sized by `ingest.queue_capacity`
    pub fn spawn_indexer(
        &self,
        cancel: CancellationToken,
    ) -> Result<(Arc<IngestQueue<FileEvent>>, JoinHandle<IndexerStats>)> {
        let queue = Arc::new(IngestQueue::new(self.config.ingest.queue_capacity)?);
        let handle = ContentIndexer::spawn(self.ingest.clone(), Arc::clone(&queue), cancel);
        Ok((queue, handle))
    }
}

fn build_tokenizer(config: &RagConfig) -> Result<Option<Arc<dyn Tokenizer>>> {
    let max_len = config.tokenizer.max_sequence_length;
    let tokenizer: Option<Arc<dyn Tokenizer>> = match config.tokenizer.kind {
        TokenizerKind::None => None,
        TokenizerKind::Word => Some(Arc::new(WordTokenizer::new(max_len))),
        TokenizerKind::Huggingface => {
            let path = config.tokenizer.path.as_ref().ok_or_else(|| {
                Error::config("tokenizer.path is required for the huggingface tokenizer")
            })?;
            Some(Arc::new(HfTokenizer::from_file(path, max_len)?))
        }
    };
    Ok(tokenizer)
}

fn build_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let dimensions = config.embeddings.dimensions;
    match config.embeddings.provider.as_str() {
        "hashing" => Ok(Arc::new(HashingEmbedder::new(dimensions)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(&config.llm, dimensions)?)),
        other => Err(Error::config(format!("unknown embedding provider '{}'", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_wire_lockfree_index() {
        let pipeline = RagPipeline::from_config(&RagConfig::default(), Collaborators::default()).unwrap();
        assert_eq!(pipeline.index().name(), "lockfree");
        assert_eq!(pipeline.index().dimensions(), Some(384));
        assert_eq!(pipeline.rag_options().top_k, 4);
    }

    #[test]
    fn test_unknown_backend_fails_at_construction() {
        let mut config = RagConfig::default();
        config.vector_index.provider = "nonexistent".to_string();

        let err = RagPipeline::from_config(&config, Collaborators::default()).err().unwrap();
        assert!(matches!(err, Error::ProviderNotRegistered(_)));
    }

    #[test]
    fn test_missing_tokenizer_file() {
        let mut config = RagConfig::default();
        config.tokenizer.kind = TokenizerKind::Huggingface;
        config.tokenizer.path = Some("/nonexistent/tokenizer.json".into());

        let err = RagPipeline::from_config(&config, Collaborators::default()).err().unwrap();
        assert!(matches!(err, Error::Tokenization(_)));
    }

    #[tokio::test]
    async fn test_spawned_indexer_stops_on_close() {
        let pipeline = RagPipeline::from_config(&RagConfig::default(), Collaborators::default()).unwrap();
        let (queue, handle) = pipeline.spawn_indexer(CancellationToken::new()).unwrap();
        queue.close();

        let stats = handle.await.unwrap();
        assert_eq!(stats, IndexerStats::default());
    }
}
