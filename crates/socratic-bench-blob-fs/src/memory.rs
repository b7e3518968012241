// crates/socratic-bench-blob-fs/src/memory.rs
// ============================================================================
// Module: In-Memory Blob Store
// Description: BlobStore over a process-local map.
// Purpose: Back tests and ephemeral hosts with real store semantics.
// Dependencies: socratic-bench-core
// ============================================================================

//! ## Overview
//! The in-memory store keeps whole objects behind a mutex, so puts are
//! atomic per object exactly like the filesystem store. Contents are lost
//! with the process; production hosts use [`crate::FsBlobStore`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;

use socratic_bench_core::BlobError;
use socratic_bench_core::BlobStore;

// ============================================================================
// SECTION: Store
// ============================================================================

/// Process-local [`BlobStore`] backed by a sorted map.
///
/// # Invariants
/// - Object replacement is atomic; readers see the old or new bytes, never a
///   mix.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    /// Object map keyed by path.
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the object map.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>, BlobError> {
        self.objects.lock().map_err(|_poisoned| BlobError::Io("store mutex poisoned".to_string()))
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        if path.is_empty() {
            return Err(BlobError::InvalidPath("empty path".to_string()));
        }
        self.lock()?.insert(path.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self.lock()?.get(path).cloned())
    }

    fn exists(&self, path: &str) -> Result<bool, BlobError> {
        Ok(self.lock()?.contains_key(path))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        Ok(self
            .lock()?
            .keys()
            .filter(|path| path.starts_with(prefix))
            .cloned()
            .collect())
    }
}
