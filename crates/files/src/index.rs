//! Per-directory hash index.
//!
//! Every upload directory has a mapping from stored filename to content digest.
//! [`HashIndex`] is the seam the store talks to. [`JsonFileIndex`] persists the
//! mapping as a sidecar JSON file and [`MemoryIndex`] keeps it in memory for tests.
//!
//! Both implementations treat an absent directory entry as an empty mapping.
//! The file-backed index also treats an unreadable or corrupt sidecar as empty.
//! A lookup never fails an upload.

use crate::{ContentHash, FilesError, INDEX_FILE_NAME};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

type Mapping = BTreeMap<String, ContentHash>;

/// Storage for the `filename -> digest` mapping of upload directories.
///
/// `directory` is always the absolute directory the files live in.
pub trait HashIndex: Send + Sync + std::fmt::Debug {
    /// Returns the first filename (in filename order) whose recorded digest is `digest`.
    fn lookup(&self, directory: &Path, digest: &ContentHash) -> Option<String>;

    /// Records `filename` as holding content with `digest`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if the updated mapping cannot be persisted.
    fn record(
        &self,
        directory: &Path,
        filename: &str,
        digest: &ContentHash,
    ) -> Result<(), FilesError>;
}

/// Hash index stored as `.hash-index.json` inside each directory.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFileIndex;

impl JsonFileIndex {
    /// Path of the sidecar file for `directory`.
    pub fn index_path(directory: &Path) -> PathBuf {
        directory.join(INDEX_FILE_NAME)
    }

    fn load(directory: &Path) -> Mapping {
        let path = Self::index_path(directory);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Mapping::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "hash index unreadable, treating as empty");
                return Mapping::new();
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(mapping) => mapping,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "hash index corrupt, treating as empty");
                Mapping::new()
            }
        }
    }

    fn persist(directory: &Path, mapping: &Mapping) -> Result<(), FilesError> {
        let path = Self::index_path(directory);
        let encoded = serde_json::to_vec_pretty(mapping)?;

        // Write next to the target and rename so readers never see a torn file.
        let tmp = directory.join(format!(
            "{}.{}.tmp",
            INDEX_FILE_NAME,
            uuid::Uuid::new_v4().simple()
        ));
        fs::write(&tmp, encoded).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write hash index {}: {}", tmp.display(), e),
            ))
        })?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to replace hash index {}: {}", path.display(), e),
            )));
        }
        Ok(())
    }
}

impl HashIndex for JsonFileIndex {
    fn lookup(&self, directory: &Path, digest: &ContentHash) -> Option<String> {
        Self::load(directory)
            .into_iter()
            .find(|(_, recorded)| recorded == digest)
            .map(|(filename, _)| filename)
    }

    fn record(
        &self,
        directory: &Path,
        filename: &str,
        digest: &ContentHash,
    ) -> Result<(), FilesError> {
        let mut mapping = Self::load(directory);
        mapping.insert(filename.to_owned(), digest.clone());
        Self::persist(directory, &mapping)
    }
}

/// In-memory hash index.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    directories: Mutex<HashMap<PathBuf, Mapping>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries recorded for `directory`.
    pub fn len(&self, directory: &Path) -> usize {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(directory)
            .map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, directory: &Path) -> bool {
        self.len(directory) == 0
    }
}

impl HashIndex for MemoryIndex {
    fn lookup(&self, directory: &Path, digest: &ContentHash) -> Option<String> {
        let directories = self
            .directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        directories.get(directory).and_then(|mapping| {
            mapping
                .iter()
                .find(|(_, recorded)| *recorded == digest)
                .map(|(filename, _)| filename.clone())
        })
    }

    fn record(
        &self,
        directory: &Path,
        filename: &str,
        digest: &ContentHash,
    ) -> Result<(), FilesError> {
        self.directories
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(directory.to_path_buf())
            .or_default()
            .insert(filename.to_owned(), digest.clone());
        Ok(())
    }
}
