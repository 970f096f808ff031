//! Per-type metadata cache
//!
//! Each store keeps one cache of its compiled per-type metadata, keyed by the
//! record's full type name. Entries are built lazily on first use and live
//! for the lifetime of the cache; schemas are immutable so nothing is ever
//! invalidated.
//!
//! ## Build protocol
//!
//! 1. Read lock: return the entry if present
//! 2. Write lock: re-check, since a racing caller may have built it while
//!    this caller waited
//! 3. Build under the write lock and store it
//!
//! At most one build runs per type, and every caller receives the same
//! `Arc`. A failed build stores nothing, so the next caller retries it.

use parking_lot::RwLock;
use recmap_core::{Result, Schema};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Lazily built, shared per-type metadata
pub struct MetadataCache<M> {
    entries: RwLock<HashMap<String, Arc<M>>>,
    builds: AtomicU64,
}

impl<M> MetadataCache<M> {
    /// Create an empty cache
    pub fn new() -> Self {
        MetadataCache {
            entries: RwLock::new(HashMap::new()),
            builds: AtomicU64::new(0),
        }
    }

    /// Metadata for `schema`, building it with `build` on first use
    ///
    /// # Errors
    ///
    /// Propagates the error of a failed build.
    pub fn get_or_build<F>(&self, schema: &Arc<Schema>, build: F) -> Result<Arc<M>>
    where
        F: FnOnce(&Arc<Schema>) -> Result<M>,
    {
        if let Some(meta) = self.entries.read().get(schema.full_name()) {
            return Ok(Arc::clone(meta));
        }

        let mut entries = self.entries.write();
        if let Some(meta) = entries.get(schema.full_name()) {
            return Ok(Arc::clone(meta));
        }
        let meta = Arc::new(build(schema)?);
        self.builds.fetch_add(1, Ordering::Relaxed);
        entries.insert(schema.full_name().to_string(), Arc::clone(&meta));
        debug!(
            target: "recmap::mapping",
            record = schema.full_name(),
            "built per-type metadata"
        );
        Ok(meta)
    }

    /// Cached metadata for a full type name, without building
    pub fn get(&self, full_name: &str) -> Option<Arc<M>> {
        self.entries.read().get(full_name).cloned()
    }

    /// Number of cached types
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether nothing is cached yet
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Number of successful builds since creation
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }
}

impl<M> Default for MetadataCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for MetadataCache<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataCache")
            .field("types", &self.len())
            .field("builds", &self.builds())
            .finish()
    }
}
