//! Name → factory table for vector index backends

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use super::{
    DiskIndex, LockedIndex, ProviderContext, SnapshotIndex, VectorIndex, VectorIndexOptions,
};
use crate::error::{Error, Result};

/// Default file name for the disk backend under a storage root
const DISK_INDEX_FILE: &str = "vectors.json";

/// Builds a backend from options and an optional provider context
pub type IndexFactory = Arc<
    dyn Fn(&VectorIndexOptions, Option<&ProviderContext>) -> Result<Arc<dyn VectorIndex>>
        + Send
        + Sync,
>;

/// Registry of vector index backends, looked up by case-insensitive name
pub struct VectorIndexRegistry {
    factories: RwLock<HashMap<String, IndexFactory>>,
}

impl VectorIndexRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the built-in `local`, `lockfree` and `disk` backends
    pub fn with_defaults() -> Self {
        let registry = Self::new();

        registry.register("local", |options, _| {
            Ok(Arc::new(LockedIndex::new(options.dimensions)) as Arc<dyn VectorIndex>)
        });

        registry.register("lockfree", |options, _| {
            Ok(Arc::new(SnapshotIndex::new(options.dimensions)) as Arc<dyn VectorIndex>)
        });

        registry.register("disk", |options, context| {
            let path = options
                .storage_path
                .clone()
                .or_else(|| {
                    context
                        .and_then(|c| c.storage_root.as_ref())
                        .map(|root| root.join(DISK_INDEX_FILE))
                })
                .ok_or_else(|| {
                    Error::config("disk index needs a storage path or a storage root")
                })?;
            Ok(Arc::new(DiskIndex::open(path, options.dimensions)?) as Arc<dyn VectorIndex>)
        });

        registry
    }

    /// Register or replace a backend
    pub fn register<F>(&self, name: &str, factory: F)
    where
        F: Fn(&VectorIndexOptions, Option<&ProviderContext>) -> Result<Arc<dyn VectorIndex>>
            + Send
            + Sync
            + 'static,
    {
        self.factories
            .write()
            .insert(name.to_lowercase(), Arc::new(factory));
    }

    /// Construct the backend registered under `name`
    pub fn create(
        &self,
        name: &str,
        options: &VectorIndexOptions,
        context: Option<&ProviderContext>,
    ) -> Result<Arc<dyn VectorIndex>> {
        // Clone the factory out so it runs without holding the lock.
        let factory = self
            .factories
            .read()
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| Error::ProviderNotRegistered(name.to_string()))?;

        let index = factory(options, context)?;
        tracing::info!("Created vector index backend '{}'", index.name());
        Ok(index)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.read().contains_key(&name.to_lowercase())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for VectorIndexRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
