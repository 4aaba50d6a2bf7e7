//! Core types for the RAG pipeline

pub mod fragment;
pub mod ingest;
pub mod response;

pub use fragment::{Fragment, Metadata};
pub use ingest::{FragmentFailure, IngestReport};
pub use response::{RagOptions, RagResponse, SearchOptions, SearchResult};
