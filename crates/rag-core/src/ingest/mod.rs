//! Document ingestion: conversion, the ingest service and background indexing

pub mod converter;
pub mod queue;
pub mod service;

pub use converter::{DocumentConverter, FileConverter, FileType};
pub use queue::{ContentIndexer, FileEvent, IndexerStats, IngestQueue};
pub use service::{IngestOptions, IngestService};
