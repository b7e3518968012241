// crates/socratic-bench-blob-fs/src/fs.rs
// ============================================================================
// Module: Filesystem Blob Store
// Description: BlobStore over a capability-scoped directory.
// Purpose: Atomic, path-addressed artifact persistence on local disk.
// Dependencies: cap-std, socratic-bench-core
// ============================================================================

//! ## Overview
//! All access happens through a [`cap_std::fs::Dir`] opened at the store
//! root, so even a malformed path cannot escape the sandbox. Writes go to a
//! temporary sibling file and rename into place; rename is atomic on the
//! filesystems the pipeline targets, which gives per-object atomicity.
//! Paths are validated before any filesystem call and fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::ErrorKind;
use std::path::Path;

use cap_std::ambient_authority;
use cap_std::fs::Dir;
use socratic_bench_core::BlobError;
use socratic_bench_core::BlobStore;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;

/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 1024;

/// Suffix for in-flight temporary objects.
const TMP_SUFFIX: &str = ".tmp";

// ============================================================================
// SECTION: Store
// ============================================================================

/// Filesystem-backed [`BlobStore`] rooted at a sandboxed directory.
///
/// # Invariants
/// - Every path is validated before use; traversal components are rejected.
/// - Objects become visible only after their rename commits.
pub struct FsBlobStore {
    /// Capability-scoped root directory.
    root: Dir,
}

impl FsBlobStore {
    /// Opens a store rooted at the given directory, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns [`BlobError::Io`] when the root cannot be created or opened.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, BlobError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .map_err(|err| BlobError::Io(format!("create root {}: {err}", root.display())))?;
        let dir = Dir::open_ambient_dir(root, ambient_authority())
            .map_err(|err| BlobError::Io(format!("open root {}: {err}", root.display())))?;
        Ok(Self {
            root: dir,
        })
    }

    /// Validates a store path and splits off its parent directory.
    fn validate(path: &str) -> Result<(), BlobError> {
        if path.is_empty() || path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(BlobError::InvalidPath(format!("path length out of range: {path}")));
        }
        if path.starts_with('/') || path.ends_with('/') {
            return Err(BlobError::InvalidPath(format!("absolute or trailing slash: {path}")));
        }
        for component in path.split('/') {
            if component.is_empty()
                || component == "."
                || component == ".."
                || component.len() > MAX_PATH_COMPONENT_LENGTH
            {
                return Err(BlobError::InvalidPath(format!("bad component in {path}")));
            }
        }
        Ok(())
    }

    /// Creates the parent directories of a validated path.
    fn ensure_parent(&self, path: &str) -> Result<(), BlobError> {
        if let Some((parent, _name)) = path.rsplit_once('/') {
            self.root
                .create_dir_all(parent)
                .map_err(|err| BlobError::Io(format!("create {parent}: {err}")))?;
        }
        Ok(())
    }

    /// Collects object paths under a directory, depth first.
    fn collect(&self, dir_path: &str, out: &mut Vec<String>) -> Result<(), BlobError> {
        let entries = if dir_path.is_empty() {
            self.root.entries()
        } else {
            self.root.read_dir(dir_path)
        };
        let entries = match entries {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(BlobError::Io(format!("read dir {dir_path}: {err}"))),
        };
        for entry in entries {
            let entry = entry.map_err(|err| BlobError::Io(format!("read entry: {err}")))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let child = if dir_path.is_empty() {
                name.to_string()
            } else {
                format!("{dir_path}/{name}")
            };
            let file_type = entry
                .file_type()
                .map_err(|err| BlobError::Io(format!("file type {child}: {err}")))?;
            if file_type.is_dir() {
                self.collect(&child, out)?;
            } else {
                out.push(child);
            }
        }
        Ok(())
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, path: &str, bytes: &[u8]) -> Result<(), BlobError> {
        Self::validate(path)?;
        self.ensure_parent(path)?;
        let tmp = format!("{path}{TMP_SUFFIX}");
        self.root.write(&tmp, bytes).map_err(|err| BlobError::Io(format!("write {tmp}: {err}")))?;
        self.root
            .rename(&tmp, &self.root, path)
            .map_err(|err| BlobError::Io(format!("rename {tmp} -> {path}: {err}")))?;
        Ok(())
    }

    fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Self::validate(path)?;
        match self.root.read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(BlobError::Io(format!("read {path}: {err}"))),
        }
    }

    fn exists(&self, path: &str) -> Result<bool, BlobError> {
        Self::validate(path)?;
        Ok(self.root.exists(path))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, BlobError> {
        if !prefix.is_empty() {
            Self::validate(prefix.trim_end_matches('/'))?;
        }
        let mut all = Vec::new();
        self.collect("", &mut all)?;
        let mut matched: Vec<String> =
            all.into_iter().filter(|path| path.starts_with(prefix)).collect();
        matched.sort();
        Ok(matched)
    }
}
