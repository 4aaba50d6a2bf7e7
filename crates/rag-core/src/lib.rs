//! rag-core: retrieval-augmented generation over a concurrent vector index
//!
//! Source text is split into overlapping token windows ([`Chunker`]), embedded
//! by an [`EmbeddingProvider`], and stored in a [`VectorIndex`] whose queries
//! always see one consistent snapshot. Questions are answered by retrieving
//! the closest fragments and handing them to a caller-supplied
//! [`LlmCallback`].
//!
//! [`RagPipeline::from_config`] wires everything from a [`RagConfig`].

pub mod chunker;
pub mod config;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod pipeline;
pub mod retrieval;
pub mod tokenizer;
pub mod types;

pub use chunker::Chunker;
pub use config::RagConfig;
pub use embedding::{EmbeddingInput, EmbeddingProvider};
pub use error::{Error, Result, RetrievalContext};
pub use generation::{callback_fn, LlmCallback, RagService};
pub use index::{VectorIndex, VectorIndexRegistry};
pub use ingest::{ContentIndexer, DocumentConverter, FileEvent, IngestQueue, IngestService};
pub use pipeline::{Collaborators, RagPipeline};
pub use retrieval::SearchService;
pub use tokenizer::Tokenizer;
pub use types::{
    Fragment, FragmentFailure, IngestReport, Metadata, RagOptions, RagResponse, SearchOptions,
    SearchResult,
};
