//! Snapshot index persisted to a JSON file

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::snapshot::Snapshot;
use super::{IndexMatch, IndexedVector, SnapshotIndex, VectorIndex};
use crate::error::Result;
use crate::types::Metadata;

/// File-backed vector index
///
/// Reads go straight to the in-memory [`SnapshotIndex`]. A write first
/// rewrites the file (temp file, then rename) from the candidate snapshot and
/// only publishes that snapshot once the file is in place, so memory never
/// holds anything the file does not.
pub struct DiskIndex {
    inner: SnapshotIndex,
    path: PathBuf,
}

impl DiskIndex {
    /// Open the index at `path`, loading any existing contents
    ///
    /// Fails with [`Error::DimensionMismatch`](crate::Error::DimensionMismatch)
    /// if the stored vectors disagree with each other or with `dimensions`.
    pub fn open(path: impl Into<PathBuf>, dimensions: Option<usize>) -> Result<Self> {
        let path = path.into();

        let entries: Vec<IndexedVector> = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            Vec::new()
        };

        let count = entries.len();
        let inner = SnapshotIndex::from_entries(dimensions, entries)?;
        tracing::info!("Opened disk index at {} with {} vectors", path.display(), count);

        Ok(Self { inner, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `snapshot` to the backing file
    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let mut records: Vec<&IndexedVector> =
            snapshot.entries.values().map(|e| e.as_ref()).collect();
        records.sort_by_key(|e| e.sequence);
        let bytes = serde_json::to_vec(&records)?;

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, bytes).and_then(|_| fs::rename(&temp_path, &self.path)) {
            if temp_path.is_file() {
                let _ = fs::remove_file(&temp_path);
            }
            tracing::warn!("Failed to persist {}: {}", self.path.display(), e);
            return Err(e.into());
        }

        tracing::debug!("Persisted {} vectors to {}", records.len(), self.path.display());
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp_path = self.path.clone().into_os_string();
        temp_path.push(".tmp");
        PathBuf::from(temp_path)
    }
}

impl VectorIndex for DiskIndex {
    fn upsert(&self, id: &str, embedding: Vec<f32>, metadata: Metadata) -> Result<()> {
        self.inner.upsert_with(id, embedding, metadata, &|next: &Snapshot| {
            self.persist(next)
        })
    }

    fn upsert_many(&self, entries: Vec<(String, Vec<f32>, Metadata)>) -> Result<()> {
        self.inner
            .upsert_many_with(entries, &|next: &Snapshot| self.persist(next))
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete_with(id, &|next: &Snapshot| self.persist(next))
    }

    fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        self.inner.query(embedding, top_k)
    }

    fn get(&self, id: &str) -> Option<Arc<IndexedVector>> {
        self.inner.get(id)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn dimensions(&self) -> Option<usize> {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "disk"
    }
}
