//! In-memory index guarded by a reader-writer lock

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{check_dimensions, rank, IndexMatch, IndexedVector, VectorIndex};
use crate::error::Result;
use crate::types::Metadata;

#[derive(Default)]
struct State {
    entries: HashMap<String, Arc<IndexedVector>>,
    dimensions: Option<usize>,
}

/// Vector index on a locked map
///
/// Queries hold the read lock for the whole scan, so every hit of a query
/// comes from the same state. Writers wait for running queries.
pub struct LockedIndex {
    state: RwLock<State>,
    sequence: AtomicU64,
}

impl LockedIndex {
    pub fn new(dimensions: Option<usize>) -> Self {
        Self {
            state: RwLock::new(State {
                entries: HashMap::new(),
                dimensions,
            }),
            sequence: AtomicU64::new(0),
        }
    }

    fn entry(&self, id: String, embedding: Vec<f32>, metadata: Metadata) -> IndexedVector {
        IndexedVector {
            id,
            embedding,
            metadata,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
        }
    }
}

impl Default for LockedIndex {
    fn default() -> Self {
        Self::new(None)
    }
}

impl VectorIndex for LockedIndex {
    fn upsert(&self, id: &str, embedding: Vec<f32>, metadata: Metadata) -> Result<()> {
        let mut state = self.state.write();
        check_dimensions(state.dimensions, embedding.len())?;
        state.dimensions = Some(embedding.len());

        let entry = self.entry(id.to_string(), embedding, metadata);
        state.entries.insert(entry.id.clone(), Arc::new(entry));
        Ok(())
    }

    fn upsert_many(&self, entries: Vec<(String, Vec<f32>, Metadata)>) -> Result<()> {
        let mut state = self.state.write();

        // Validate the whole batch first so a bad vector leaves no partial write.
        let mut dimensions = state.dimensions;
        for (_, embedding, _) in &entries {
            check_dimensions(dimensions, embedding.len())?;
            dimensions = Some(embedding.len());
        }
        state.dimensions = dimensions;

        for (id, embedding, metadata) in entries {
            let entry = self.entry(id, embedding, metadata);
            state.entries.insert(entry.id.clone(), Arc::new(entry));
        }
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.state.write().entries.remove(id).is_some())
    }

    fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        let state = self.state.read();
        if state.entries.is_empty() {
            return Ok(Vec::new());
        }
        check_dimensions(state.dimensions, embedding.len())?;
        Ok(rank(state.entries.values(), embedding, top_k))
    }

    fn get(&self, id: &str) -> Option<Arc<IndexedVector>> {
        self.state.read().entries.get(id).cloned()
    }

    fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    fn dimensions(&self) -> Option<usize> {
        self.state.read().dimensions
    }

    fn name(&self) -> &str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_order() {
        let index = LockedIndex::default();
        index.upsert("x", vec![1.0, 0.0], Metadata::new()).unwrap();
        index.upsert("y", vec![0.0, 1.0], Metadata::new()).unwrap();
        index.upsert("xy", vec![1.0, 1.0], Metadata::new()).unwrap();

        let matches = index.query(&[1.0, 0.2], 2).unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "xy"]);
    }

    #[test]
    fn test_batch_rejected_whole() {
        let index = LockedIndex::new(Some(2));
        let batch = vec![
            ("a".to_string(), vec![1.0, 0.0], Metadata::new()),
            ("b".to_string(), vec![1.0], Metadata::new()),
        ];
        assert!(index.upsert_many(batch).is_err());
        assert!(index.is_empty());
    }

    #[test]
    fn test_delete_missing() {
        let index = LockedIndex::default();
        assert!(!index.delete("nope").unwrap());
    }
}
