//! Vector index: concurrent id → (embedding, metadata) store with top-K search
//!
//! Backends are chosen by name through [`VectorIndexRegistry`]:
//! - `lockfree`: [`SnapshotIndex`], copy-on-write snapshots with wait-free reads
//! - `local`: [`LockedIndex`], a reader-writer locked map
//! - `disk`: [`DiskIndex`], the snapshot index persisted to a JSON file

mod disk;
mod locked;
mod registry;
mod snapshot;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::types::Metadata;

pub use disk::DiskIndex;
pub use locked::LockedIndex;
pub use registry::{IndexFactory, VectorIndexRegistry};
pub use snapshot::SnapshotIndex;

/// A stored vector, replaced wholesale on re-upsert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedVector {
    pub id: String,
    pub embedding: Vec<f32>,
    pub metadata: Metadata,
    /// Insertion stamp; larger means more recently upserted
    pub sequence: u64,
}

/// A query hit
///
/// `entry` is the stored vector the score was computed from, taken from the
/// same view of the index as every other hit of the query.
#[derive(Debug, Clone)]
pub struct IndexMatch {
    pub id: String,
    pub score: f32,
    pub entry: Arc<IndexedVector>,
}

/// Options handed to backend factories
#[derive(Debug, Clone, Default)]
pub struct VectorIndexOptions {
    /// Fix the dimension up front instead of on first insert
    pub dimensions: Option<usize>,
    /// Backing file for persistent backends
    pub storage_path: Option<PathBuf>,
}

/// Environment a backend may draw on at construction
#[derive(Debug, Clone, Default)]
pub struct ProviderContext {
    /// Directory for backends that need storage and got no explicit path
    pub storage_root: Option<PathBuf>,
}

/// Trait for vector indexes
///
/// All methods are safe to call from many threads at once without external
/// locking. A query never observes a partially written vector.
pub trait VectorIndex: Send + Sync {
    /// Insert or atomically replace the entry for `id`
    fn upsert(&self, id: &str, embedding: Vec<f32>, metadata: Metadata) -> Result<()>;

    /// Insert or replace several entries
    ///
    /// Default implementation calls `upsert` sequentially.
    fn upsert_many(&self, entries: Vec<(String, Vec<f32>, Metadata)>) -> Result<()> {
        for (id, embedding, metadata) in entries {
            self.upsert(&id, embedding, metadata)?;
        }
        Ok(())
    }

    /// Remove an entry; returns whether it existed
    fn delete(&self, id: &str) -> Result<bool>;

    /// At most `top_k` entries by descending cosine similarity
    fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<IndexMatch>>;

    /// Look up one entry
    fn get(&self, id: &str) -> Option<Arc<IndexedVector>>;

    /// Number of stored vectors
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Established dimension, if any vector was inserted or it was configured
    fn dimensions(&self) -> Option<usize>;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Cosine similarity; zero vectors score 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Reject a vector whose length disagrees with the established dimension
pub(crate) fn check_dimensions(expected: Option<usize>, actual: usize) -> Result<()> {
    if actual == 0 {
        return Err(Error::embedding("empty embedding"));
    }
    match expected {
        Some(expected) if expected != actual => Err(Error::DimensionMismatch { expected, actual }),
        _ => Ok(()),
    }
}

/// Score every entry and keep the best `top_k`
///
/// Ties on score go to the most recently inserted entry.
pub(crate) fn rank<'a>(
    entries: impl Iterator<Item = &'a Arc<IndexedVector>>,
    query: &[f32],
    top_k: usize,
) -> Vec<IndexMatch> {
    if top_k == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(f32, &Arc<IndexedVector>)> = entries
        .map(|entry| {
            let score = cosine_similarity(query, &entry.embedding);
            (if score.is_nan() { 0.0 } else { score }, entry)
        })
        .collect();

    if scored.len() > top_k {
        scored.select_nth_unstable_by(top_k - 1, by_rank);
        scored.truncate(top_k);
    }
    scored.sort_unstable_by(by_rank);

    scored
        .into_iter()
        .map(|(score, entry)| IndexMatch {
            id: entry.id.clone(),
            score,
            entry: Arc::clone(entry),
        })
        .collect()
}

fn by_rank(a: &(f32, &Arc<IndexedVector>), b: &(f32, &Arc<IndexedVector>)) -> Ordering {
    b.0.total_cmp(&a.0)
        .then_with(|| b.1.sequence.cmp(&a.1.sequence))
}
