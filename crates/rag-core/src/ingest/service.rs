//! Convert → chunk → embed → upsert

use dashmap::DashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::converter::DocumentConverter;
use crate::chunker::Chunker;
use crate::embedding::{EmbeddingInput, EmbeddingProvider};
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::tokenizer::encode_async;
use crate::types::{Fragment, FragmentFailure, IngestReport, Metadata};

const KEY_FILE_NAME: &str = "file_name";
const KEY_PATH: &str = "path";

/// Chunking and embedding settings for ingest
#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub target_tokens: usize,
    pub overlap_tokens: usize,
    /// Embed token ids instead of text; needs a tokenizer on the chunker
    pub embed_token_ids: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            target_tokens: 256,
            overlap_tokens: 32,
            embed_token_ids: false,
        }
    }
}

/// Ingests files and raw text into the vector index
///
/// Fragments of one call are embedded and upserted in source order. A
/// fragment that fails is recorded in the report and skipped; the rest of the
/// source still goes in.
#[derive(Clone)]
pub struct IngestService {
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    converter: Arc<dyn DocumentConverter>,
    options: IngestOptions,
    /// Fragment ids stored per source by this service
    sources: Arc<DashMap<String, Vec<String>>>,
}

impl IngestService {
    pub fn new(
        chunker: Chunker,
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        converter: Arc<dyn DocumentConverter>,
        options: IngestOptions,
    ) -> Result<Self> {
        if options.target_tokens == 0 || options.overlap_tokens >= options.target_tokens {
            return Err(Error::config(format!(
                "invalid chunk window: target={}, overlap={}",
                options.target_tokens, options.overlap_tokens
            )));
        }
        if options.embed_token_ids && chunker.tokenizer().is_none() {
            return Err(Error::config("embedding token ids requires a tokenizer"));
        }

        Ok(Self {
            chunker,
            embedder,
            index,
            converter,
            options,
            sources: Arc::new(DashMap::new()),
        })
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn options(&self) -> &IngestOptions {
        &self.options
    }

    /// Ingest a file; its path is the source name
    pub async fn index_file(&self, path: impl AsRef<Path>) -> Result<IngestReport> {
        self.index_file_with(path, &CancellationToken::new()).await
    }

    /// Ingest a file, stopping before the next fragment on cancellation
    pub async fn index_file_with(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let path = path.as_ref();
        let source = path.to_string_lossy().to_string();
        if cancel.is_cancelled() {
            return Ok(Self::cancelled_report(source));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| source.clone());

        let data = tokio::fs::read(path).await?;
        let converter = Arc::clone(&self.converter);
        let name = file_name.clone();
        let text =
            tokio::task::spawn_blocking(move || converter.convert(&data, Some(&name))).await??;

        let mut extra = Metadata::new();
        extra.insert(KEY_FILE_NAME.to_string(), serde_json::json!(file_name));
        extra.insert(KEY_PATH.to_string(), serde_json::json!(source));

        self.ingest(source, text, None, extra, cancel).await
    }

    /// Ingest raw text
    ///
    /// Without an `id` the source name is derived from the content, so
    /// ingesting the same text again replaces rather than duplicates.
    pub async fn index_text(&self, text: &str, id: Option<&str>) -> Result<IngestReport> {
        self.index_text_with(text, id, None, &CancellationToken::new())
            .await
    }

    /// Ingest raw text with caller metadata and a cancellation token
    pub async fn index_text_with(
        &self,
        text: &str,
        id: Option<&str>,
        metadata: Option<Metadata>,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let source = match id {
            Some(id) => id.to_string(),
            None => Fragment::content_source(text),
        };
        self.ingest(source, text.to_string(), metadata, Metadata::new(), cancel)
            .await
    }

    /// Delete every fragment of a source; returns how many were removed
    pub async fn remove_source(&self, source: &str) -> Result<usize> {
        let tracked = self
            .sources
            .remove(source)
            .map(|(_, ids)| ids)
            .unwrap_or_default();

        let mut removed = 0;
        for id in &tracked {
            if self.index.delete(id)? {
                removed += 1;
            }
        }
        // Fragments stored by an earlier process are not tracked; walk the
        // derived ids until one is missing.
        removed += self.delete_derived_from(source, 0)?;

        tracing::info!("Removed {} fragments of '{}'", removed, source);
        Ok(removed)
    }

    /// Sources ingested through this service
    pub fn sources(&self) -> Vec<String> {
        let mut sources: Vec<String> = self.sources.iter().map(|e| e.key().clone()).collect();
        sources.sort();
        sources
    }

    async fn ingest(
        &self,
        source: String,
        text: String,
        metadata: Option<Metadata>,
        extra: Metadata,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::new(source.clone());
        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        let chunker = self.chunker.clone();
        let (target, overlap) = (self.options.target_tokens, self.options.overlap_tokens);
        let chunk_source = source.clone();
        let fragments = tokio::task::spawn_blocking(move || {
            chunker.split_source(&text, &chunk_source, target, overlap)
        })
        .await??;

        tracing::debug!("Chunked '{}' into {} fragments", source, fragments.len());

        let fragment_count = fragments.len();
        let mut embedded = Vec::with_capacity(fragment_count);
        for fragment in fragments {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let fragment = match &metadata {
                Some(m) => fragment.with_metadata(m.clone()),
                None => fragment,
            };

            match self.embed_fragment(&fragment, cancel).await {
                Ok(embedding) => embedded.push((fragment, embedding)),
                Err(Error::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!("Skipping fragment {}: {}", fragment.id, e);
                    report.failures.push(FragmentFailure {
                        fragment_id: fragment.id,
                        chunk_index: fragment.chunk_index,
                        error: e.to_string(),
                    });
                }
            }
        }

        // Fragments embedded before a cancellation are still stored.
        self.store_fragments(embedded, &extra, &mut report);

        if report.cancelled {
            // Keep tracking everything that may be in the index.
            let mut entry = self.sources.entry(source.clone()).or_default();
            for id in &report.fragment_ids {
                if !entry.contains(id) {
                    entry.push(id.clone());
                }
            }
        } else {
            report.stale_removed = self.replace_tracked(&source, &report.fragment_ids, fragment_count)?;
        }

        tracing::info!(
            "Ingested '{}': {} fragments stored, {} failed, {} stale removed{}",
            source,
            report.fragment_ids.len(),
            report.failures.len(),
            report.stale_removed,
            if report.cancelled { " (cancelled)" } else { "" }
        );

        Ok(report)
    }

    async fn embed_fragment(
        &self,
        fragment: &Fragment,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        match self.chunker.tokenizer() {
            Some(tokenizer) if self.options.embed_token_ids => {
                let encoding = encode_async(Arc::clone(tokenizer), fragment.text.clone()).await?;
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(Error::Cancelled),
                    embedding = self.embedder.embed(EmbeddingInput::TokenIds(&encoding.token_ids)) => embedding,
                }
            }
            _ => tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                embedding = self.embedder.embed_text(&fragment.text) => embedding,
            },
        }
    }

    /// Upsert the embedded fragments of one run as a single batch, in source order
    ///
    /// A rejected batch marks every fragment in it as failed.
    fn store_fragments(
        &self,
        embedded: Vec<(Fragment, Vec<f32>)>,
        extra: &Metadata,
        report: &mut IngestReport,
    ) {
        if embedded.is_empty() {
            return;
        }

        let mut stored = Vec::with_capacity(embedded.len());
        let batch: Vec<(String, Vec<f32>, Metadata)> = embedded
            .into_iter()
            .map(|(fragment, embedding)| {
                let mut metadata = fragment.to_index_metadata();
                metadata.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
                stored.push((fragment.id.clone(), fragment.chunk_index));
                (fragment.id, embedding, metadata)
            })
            .collect();

        match self.index.upsert_many(batch) {
            Ok(()) => {
                tracing::debug!("Stored {} fragments of '{}'", stored.len(), report.source);
                report.fragment_ids.extend(stored.into_iter().map(|(id, _)| id));
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to store {} fragments of '{}': {}",
                    stored.len(),
                    report.source,
                    e
                );
                let error = e.to_string();
                report.failures.extend(stored.into_iter().map(|(fragment_id, chunk_index)| {
                    FragmentFailure {
                        fragment_id,
                        chunk_index,
                        error: error.clone(),
                    }
                }));
                report.failures.sort_by_key(|f| f.chunk_index);
            }
        }
    }

    /// Record the ids of a completed run and delete what it no longer produced
    fn replace_tracked(&self, source: &str, stored: &[String], produced: usize) -> Result<usize> {
        let previous = self
            .sources
            .insert(source.to_string(), stored.to_vec())
            .unwrap_or_default();

        let keep: HashSet<&String> = stored.iter().collect();
        let mut removed = 0;
        for id in previous.iter().filter(|id| !keep.contains(id)) {
            if self.index.delete(id)? {
                removed += 1;
            }
        }
        removed += self.delete_derived_from(source, produced)?;

        Ok(removed)
    }

    /// Delete `{source}#{start}`, `{source}#{start + 1}`, ... up to the first gap
    fn delete_derived_from(&self, source: &str, start: usize) -> Result<usize> {
        let mut removed = 0;
        let mut chunk_index = start;
        while self.index.delete(&Fragment::derive_id(source, chunk_index))? {
            removed += 1;
            chunk_index += 1;
        }
        Ok(removed)
    }

    fn cancelled_report(source: String) -> IngestReport {
        let mut report = IngestReport::new(source);
        report.cancelled = true;
        report
    }
}
