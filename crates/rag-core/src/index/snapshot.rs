//! Copy-on-write snapshot index with wait-free reads
//!
//! The live vector set is an immutable [`Snapshot`]. A writer clones the
//! current snapshot (entries are `Arc`s, so this copies pointers, not
//! vectors), applies its change, and publishes the new snapshot with a single
//! atomic swap. Readers pin the epoch, load the pointer once and work against
//! that snapshot for the rest of the call. Superseded snapshots are freed by
//! crossbeam-epoch once no pinned reader can still see them.

use crossbeam::epoch::{self, Atomic, Guard, Owned};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{check_dimensions, rank, IndexMatch, IndexedVector, VectorIndex};
use crate::error::Result;
use crate::types::Metadata;

/// One published version of the vector set
#[derive(Clone, Default)]
pub(crate) struct Snapshot {
    pub(crate) version: u64,
    pub(crate) dimensions: Option<usize>,
    pub(crate) entries: HashMap<String, Arc<IndexedVector>>,
}

impl Snapshot {
    fn next(&self) -> Self {
        Self {
            version: self.version + 1,
            dimensions: self.dimensions,
            entries: self.entries.clone(),
        }
    }

    fn insert(&mut self, entry: IndexedVector) -> Result<()> {
        check_dimensions(self.dimensions, entry.embedding.len())?;
        self.dimensions = Some(entry.embedding.len());
        self.entries.insert(entry.id.clone(), Arc::new(entry));
        Ok(())
    }
}

/// Hook run on a candidate snapshot, under the writer lock, before it is published
pub(crate) type Commit<'a> = &'a dyn Fn(&Snapshot) -> Result<()>;

fn publish(_: &Snapshot) -> Result<()> {
    Ok(())
}

/// Vector index backed by atomically swapped immutable snapshots
pub struct SnapshotIndex {
    current: Atomic<Snapshot>,
    /// Serializes writers; readers never take it
    writer: Mutex<()>,
    sequence: AtomicU64,
}

impl SnapshotIndex {
    /// Create an empty index, optionally with a fixed dimension
    pub fn new(dimensions: Option<usize>) -> Self {
        Self::with_snapshot(
            Snapshot {
                dimensions,
                ..Default::default()
            },
            0,
        )
    }

    /// Create an index pre-populated with entries
    ///
    /// Every entry must match `dimensions` when given, and otherwise the
    /// first entry. Entries keep their sequence stamps; new writes are
    /// stamped after them.
    pub(crate) fn from_entries(
        dimensions: Option<usize>,
        entries: Vec<IndexedVector>,
    ) -> Result<Self> {
        let mut snapshot = Snapshot {
            dimensions,
            entries: HashMap::with_capacity(entries.len()),
            ..Default::default()
        };
        let mut last_sequence = 0;
        for entry in entries {
            last_sequence = last_sequence.max(entry.sequence);
            snapshot.insert(entry)?;
        }
        Ok(Self::with_snapshot(snapshot, last_sequence))
    }

    fn with_snapshot(snapshot: Snapshot, last_sequence: u64) -> Self {
        Self {
            current: Atomic::new(snapshot),
            writer: Mutex::new(()),
            sequence: AtomicU64::new(last_sequence),
        }
    }

    /// Version of the currently published snapshot
    pub fn version(&self) -> u64 {
        self.read(|snapshot| snapshot.version)
    }

    /// Run `f` against the snapshot published at call time
    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> T {
        let guard = epoch::pin();
        f(Self::load(&self.current, &guard))
    }

    fn load<'g>(current: &Atomic<Snapshot>, guard: &'g Guard) -> &'g Snapshot {
        let shared = current.load(Ordering::Acquire, guard);
        // SAFETY: `current` is initialised non-null and only ever replaced by
        // swap with another non-null pointer. The old pointer is destroyed via
        // `defer_destroy`, which waits for every guard pinned before the swap,
        // so the reference is valid for as long as `guard` lives.
        unsafe { shared.deref() }
    }

    /// Build the next snapshot from the current one and publish it
    ///
    /// `commit` sees the candidate before it is published. If `mutate` or
    /// `commit` fails nothing is published.
    fn write<T>(
        &self,
        mutate: impl FnOnce(&mut Snapshot) -> Result<T>,
        commit: Commit<'_>,
    ) -> Result<T> {
        let _writer = self.writer.lock();
        let guard = epoch::pin();

        let mut next = Self::load(&self.current, &guard).next();
        let outcome = mutate(&mut next)?;
        commit(&next)?;

        let previous = self.current.swap(Owned::new(next), Ordering::AcqRel, &guard);
        // SAFETY: `previous` was unlinked by the swap above, and writers are
        // serialized, so no other thread can unlink or free it. Readers that
        // loaded it are covered by the deferred destruction.
        unsafe { guard.defer_destroy(previous) };

        Ok(outcome)
    }

    pub(crate) fn upsert_with(
        &self,
        id: &str,
        embedding: Vec<f32>,
        metadata: Metadata,
        commit: Commit<'_>,
    ) -> Result<()> {
        self.write(
            |snapshot| {
                snapshot.insert(IndexedVector {
                    id: id.to_string(),
                    embedding,
                    metadata,
                    sequence: self.stamp(),
                })
            },
            commit,
        )
    }

    pub(crate) fn upsert_many_with(
        &self,
        entries: Vec<(String, Vec<f32>, Metadata)>,
        commit: Commit<'_>,
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        self.write(
            |snapshot| {
                for (id, embedding, metadata) in entries {
                    snapshot.insert(IndexedVector {
                        id,
                        embedding,
                        metadata,
                        sequence: self.stamp(),
                    })?;
                }
                Ok(())
            },
            commit,
        )
    }

    pub(crate) fn delete_with(&self, id: &str, commit: Commit<'_>) -> Result<bool> {
        if self.get(id).is_none() {
            return Ok(false);
        }
        self.write(|snapshot| Ok(snapshot.entries.remove(id).is_some()), commit)
    }

    fn stamp(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for SnapshotIndex {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Drop for SnapshotIndex {
    fn drop(&mut self) {
        // SAFETY: `&mut self` guarantees no reader or writer is active on this
        // index, so the current snapshot can be reclaimed immediately.
        unsafe {
            let guard = epoch::unprotected();
            let current = self.current.load(Ordering::Acquire, guard);
            if !current.is_null() {
                drop(current.into_owned());
            }
        }
    }
}

impl VectorIndex for SnapshotIndex {
    fn upsert(&self, id: &str, embedding: Vec<f32>, metadata: Metadata) -> Result<()> {
        self.upsert_with(id, embedding, metadata, &publish)
    }

    fn upsert_many(&self, entries: Vec<(String, Vec<f32>, Metadata)>) -> Result<()> {
        self.upsert_many_with(entries, &publish)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        self.delete_with(id, &publish)
    }

    fn query(&self, embedding: &[f32], top_k: usize) -> Result<Vec<IndexMatch>> {
        self.read(|snapshot| {
            if snapshot.entries.is_empty() {
                return Ok(Vec::new());
            }
            check_dimensions(snapshot.dimensions, embedding.len())?;
            Ok(rank(snapshot.entries.values(), embedding, top_k))
        })
    }

    fn get(&self, id: &str) -> Option<Arc<IndexedVector>> {
        self.read(|snapshot| snapshot.entries.get(id).cloned())
    }

    fn len(&self) -> usize {
        self.read(|snapshot| snapshot.entries.len())
    }

    fn dimensions(&self) -> Option<usize> {
        self.read(|snapshot| snapshot.dimensions)
    }

    fn name(&self) -> &str {
        "lockfree"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_upsert_replaces() {
        let index = SnapshotIndex::default();
        index.upsert("a", vec![1.0, 0.0], Metadata::new()).unwrap();
        index.upsert("a", vec![0.0, 1.0], Metadata::new()).unwrap();

        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").unwrap().embedding, vec![0.0, 1.0]);
        assert_eq!(index.version(), 2);
    }

    #[test]
    fn test_delete() {
        let index = SnapshotIndex::default();
        index.upsert("a", vec![1.0, 0.0], Metadata::new()).unwrap();

        assert!(index.delete("a").unwrap());
        assert!(!index.delete("a").unwrap());
        assert!(index.is_empty());
        // The established dimension survives deletion.
        assert_eq!(index.dimensions(), Some(2));
    }

    #[test]
    fn test_dimension_mismatch_publishes_nothing() {
        let index = SnapshotIndex::default();
        index.upsert("a", vec![1.0, 0.0], Metadata::new()).unwrap();
        let version = index.version();

        let err = index.upsert("b", vec![1.0, 0.0, 0.0], Metadata::new()).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
        assert_eq!(index.version(), version);

        let batch = vec![
            ("c".to_string(), vec![0.5, 0.5], Metadata::new()),
            ("d".to_string(), vec![0.5], Metadata::new()),
        ];
        assert!(index.upsert_many(batch).is_err());
        assert!(index.get("c").is_none());
    }

    #[test]
    fn test_query_empty_and_mismatched() {
        let index = SnapshotIndex::new(Some(3));
        assert!(index.query(&[1.0, 0.0], 5).unwrap().is_empty());

        index.upsert("a", vec![1.0, 0.0, 0.0], Metadata::new()).unwrap();
        assert!(index.query(&[1.0, 0.0], 5).is_err());
    }

    #[test]
    fn test_snapshot_survives_later_writes() {
        let index = SnapshotIndex::default();
        index.upsert("a", vec![1.0, 0.0], Metadata::new()).unwrap();

        let matches = index.query(&[1.0, 0.0], 1).unwrap();
        index.upsert("a", vec![0.0, 1.0], Metadata::new()).unwrap();
        index.delete("a").unwrap();

        // The hit still refers to the vector it was scored against.
        assert_eq!(matches[0].entry.embedding, vec![1.0, 0.0]);
    }

    #[test]
    fn test_from_entries_continues_sequence() {
        let entries = vec![IndexedVector {
            id: "a".to_string(),
            embedding: vec![1.0, 0.0],
            metadata: Metadata::new(),
            sequence: 41,
        }];
        let index = SnapshotIndex::from_entries(None, entries).unwrap();
        index.upsert("b", vec![1.0, 0.0], Metadata::new()).unwrap();

        assert_eq!(index.dimensions(), Some(2));
        assert_eq!(index.get("b").unwrap().sequence, 42);
        let top = index.query(&[1.0, 0.0], 1).unwrap();
        assert_eq!(top[0].id, "b");
    }

    fn stored(id: &str, embedding: Vec<f32>) -> IndexedVector {
        IndexedVector {
            id: id.to_string(),
            embedding,
            metadata: Metadata::new(),
            sequence: 1,
        }
    }

    #[test]
    fn test_from_entries_rejects_mixed_dimensions() {
        let entries = vec![stored("a", vec![1.0, 0.0]), stored("b", vec![1.0, 0.0, 0.0])];
        let err = SnapshotIndex::from_entries(None, entries).err().unwrap();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));

        let err = SnapshotIndex::from_entries(Some(2), vec![stored("a", vec![1.0; 4])])
            .err()
            .unwrap();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 4 }));
    }

    #[test]
    fn test_failed_commit_publishes_nothing() {
        let index = SnapshotIndex::default();
        let reject = |_: &Snapshot| -> Result<()> { Err(Error::internal("rejected")) };

        assert!(index.upsert_with("a", vec![1.0], Metadata::new(), &reject).is_err());
        assert!(index.get("a").is_none());
        assert_eq!(index.version(), 0);
    }
}
