//! Retrieval over the vector index

mod search;

pub use search::SearchService;
