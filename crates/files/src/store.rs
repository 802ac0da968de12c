//! Deduplicating upload store.
//!
//! [`UploadStore`] owns a storage root and writes uploads into directories below
//! it. Before writing, the content digest is looked up in the directory's hash
//! index; a hit returns the existing file instead of storing a second copy.
//!
//! # Paths
//!
//! Every path crossing this API is relative to the storage root and uses `/` as
//! separator (`books/3f2a…-1729161600000.jpg`). Relative paths are validated
//! before use:
//!
//! - no empty, `.` or `..` segments
//! - no leading `/` and no `\`
//! - no segment starting with `.`, which also keeps the index sidecar private
//!
//! Reads additionally canonicalise the resolved path and require it to stay
//! inside the root, so a symlink cannot lead outside the store.
//!
//! # Concurrency
//!
//! The lookup, write and index update for one directory run under that
//! directory's lock (see [`DirectoryLocks`]). The store is `Send + Sync` and is
//! shared behind an `Arc` by the API layer.

use crate::constants::MAX_NAME_ATTEMPTS;
use crate::{
    generate_file_name, ContentHash, DirectoryLocks, FilesError, HashIndex, FALLBACK_MEDIA_TYPE,
};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Whether an upload produced a new file or matched an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreOutcome {
    /// The bytes were written under a newly generated name
    Stored,
    /// Identical bytes were already present; nothing was written
    AlreadyExisted,
}

/// Result of storing an upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoredFile {
    /// Generated filename within the directory
    pub filename: String,

    /// Path relative to the storage root, `/`-separated
    pub relative_path: String,

    /// Digest of the uploaded bytes
    pub digest: ContentHash,

    /// Size of the upload in bytes
    pub size_bytes: u64,

    pub outcome: StoreOutcome,
}

impl StoredFile {
    pub fn already_existed(&self) -> bool {
        self.outcome == StoreOutcome::AlreadyExisted
    }
}

/// Content-deduplicating store rooted at a private directory.
#[derive(Debug)]
pub struct UploadStore {
    /// Canonicalised storage root
    root_directory: PathBuf,

    index: Arc<dyn HashIndex>,

    locks: DirectoryLocks,
}

impl UploadStore {
    /// Creates a store over an existing root directory.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidRootDirectory`] if the root does not exist,
    /// is not a directory, or cannot be canonicalised.
    pub fn new(root_directory: &Path, index: Arc<dyn HashIndex>) -> Result<Self, FilesError> {
        if !root_directory.exists() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Directory does not exist: {}",
                root_directory.display()
            )));
        }

        if !root_directory.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root_directory.display()
            )));
        }

        let root_directory = root_directory.canonicalize().map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot canonicalize path {}: {}",
                root_directory.display(),
                e
            ))
        })?;

        Ok(Self {
            root_directory,
            index,
            locks: DirectoryLocks::new(),
        })
    }

    /// Returns the canonicalised storage root.
    pub fn root_directory(&self) -> &Path {
        &self.root_directory
    }

    /// Stores `bytes` in `relative_dir`, reusing an identical existing file.
    ///
    /// The directory is created if needed. When the directory's index already
    /// maps a file to the digest of `bytes` and that file is still on disk, its
    /// path is returned with [`StoreOutcome::AlreadyExisted`] and nothing is
    /// written. Otherwise the bytes are written under a fresh name derived from
    /// `original_filename`'s extension and recorded in the index.
    ///
    /// A failure to update the index after the file was written is logged and
    /// does not fail the upload; the file is then simply not deduplicated.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - `relative_dir` is not a safe relative path
    /// - the directory cannot be created (I/O)
    /// - the file cannot be written (I/O)
    pub fn store(
        &self,
        bytes: &[u8],
        original_filename: &str,
        relative_dir: &str,
    ) -> Result<StoredFile, FilesError> {
        let relative_dir = normalise_relative(relative_dir)?;
        let directory = self.root_directory.join(&relative_dir);

        fs::create_dir_all(&directory).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create storage directory {}: {}",
                    directory.display(),
                    e
                ),
            ))
        })?;

        let digest = ContentHash::compute(bytes);
        let size_bytes = bytes.len() as u64;

        let lease = self.locks.lease(&directory);
        let _guard = lease.lock();

        if let Some(existing) = self.index.lookup(&directory, &digest) {
            if is_plain_file_name(&existing) && directory.join(&existing).is_file() {
                tracing::debug!(directory = %relative_dir, filename = %existing, "duplicate upload");
                return Ok(StoredFile {
                    relative_path: format!("{relative_dir}/{existing}"),
                    filename: existing,
                    digest,
                    size_bytes,
                    outcome: StoreOutcome::AlreadyExisted,
                });
            }
            tracing::warn!(
                directory = %relative_dir,
                filename = %existing,
                "hash index entry points at a missing file, storing again"
            );
        }

        let filename = write_new_file(&directory, bytes, original_filename)?;

        if let Err(e) = self.index.record(&directory, &filename, &digest) {
            tracing::error!(
                directory = %relative_dir,
                filename = %filename,
                error = %e,
                "failed to record upload in hash index"
            );
        }

        tracing::info!(directory = %relative_dir, filename = %filename, size_bytes, "stored upload");

        Ok(StoredFile {
            relative_path: format!("{relative_dir}/{filename}"),
            filename,
            digest,
            size_bytes,
            outcome: StoreOutcome::Stored,
        })
    }

    /// Resolves a root-relative file path to its absolute location.
    ///
    /// This is purely syntactic; the file may not exist.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::InvalidPath`] if `relative_path` is not a safe relative path.
    pub fn resolve(&self, relative_path: &str) -> Result<PathBuf, FilesError> {
        let relative_path = normalise_relative(relative_path)?;
        Ok(self.root_directory.join(relative_path))
    }

    /// Reads a stored file.
    ///
    /// # Errors
    ///
    /// Returns `FilesError` if:
    /// - the path is invalid or escapes the root through a symlink
    /// - no file exists at the path
    /// - the file cannot be read (I/O)
    pub fn read(&self, relative_path: &str) -> Result<Vec<u8>, FilesError> {
        let path = self.resolve(relative_path)?;

        if !path.is_file() {
            return Err(FilesError::NotFound(relative_path.to_owned()));
        }

        let canonical = path.canonicalize()?;
        if !canonical.starts_with(&self.root_directory) {
            return Err(FilesError::InvalidPath(format!(
                "{relative_path} resolves outside the storage root"
            )));
        }

        fs::read(&canonical).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read file from {}: {}", canonical.display(), e),
            ))
        })
    }
}

/// Media type for a stored file.
///
/// The extension decides first, then magic bytes in `bytes`, then
/// [`FALLBACK_MEDIA_TYPE`].
pub fn detect_media_type(path: &Path, bytes: &[u8]) -> String {
    if let Some(mime) = mime_guess::from_path(path).first() {
        return mime.essence_str().to_owned();
    }
    infer::get(bytes)
        .map(|kind| kind.mime_type().to_owned())
        .unwrap_or_else(|| FALLBACK_MEDIA_TYPE.to_owned())
}

/// Validates a `/`-separated relative path and returns it without redundant slashes.
fn normalise_relative(input: &str) -> Result<String, FilesError> {
    if input.is_empty() {
        return Err(FilesError::InvalidPath("path is empty".into()));
    }
    if input.starts_with('/') {
        return Err(FilesError::InvalidPath(format!("{input} is absolute")));
    }

    let segments: Vec<&str> = input.split('/').collect();
    for segment in &segments {
        if !is_plain_file_name(segment) {
            return Err(FilesError::InvalidPath(format!(
                "{input} contains unsafe segment {segment:?}"
            )));
        }
    }
    Ok(segments.join("/"))
}

/// A single name that cannot escape or reveal anything when joined onto a directory.
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\', '\0'])
        && !Path::new(name).has_root()
}

/// Writes `bytes` under a freshly generated name and returns that name.
fn write_new_file(
    directory: &Path,
    bytes: &[u8],
    original_filename: &str,
) -> Result<String, FilesError> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let filename = generate_file_name(original_filename);
        let path = directory.join(&filename);

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {}: {}", path.display(), e),
                )))
            }
        };

        let written = file.write_all(bytes).and_then(|()| file.sync_all());
        if let Err(e) = written {
            drop(file);
            let _ = fs::remove_file(&path);
            return Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write file to {}: {}", path.display(), e),
            )));
        }

        return Ok(filename);
    }

    Err(FilesError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!(
            "Could not find a free filename in {} after {} attempts",
            directory.display(),
            MAX_NAME_ATTEMPTS
        ),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{JsonFileIndex, MemoryIndex, INDEX_FILE_NAME};
    use tempfile::TempDir;

    fn json_store(temp: &TempDir) -> UploadStore {
        UploadStore::new(temp.path(), Arc::new(JsonFileIndex)).unwrap()
    }

    /// Files in `dir`, excluding the index sidecar.
    fn stored_files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|n| n != INDEX_FILE_NAME)
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_new_root_not_exists() {
        let temp = TempDir::new().unwrap();
        let result = UploadStore::new(&temp.path().join("missing"), Arc::new(JsonFileIndex));
        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_new_root_not_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file.txt");
        fs::write(&file, "not a directory").unwrap();

        let result = UploadStore::new(&file, Arc::new(JsonFileIndex));
        assert!(matches!(result, Err(FilesError::InvalidRootDirectory(_))));
    }

    #[test]
    fn test_store_creates_directory_and_file() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        let stored = store.store(b"Hello, World!", "hello.txt", "generic/a/b").unwrap();

        assert_eq!(stored.outcome, StoreOutcome::Stored);
        assert_eq!(stored.size_bytes, 13);
        assert!(stored.relative_path.starts_with("generic/a/b/"));
        assert!(stored.filename.ends_with(".txt"));

        let on_disk = store.root_directory().join(&stored.relative_path);
        assert_eq!(fs::read(on_disk).unwrap(), b"Hello, World!");
        assert!(store
            .root_directory()
            .join("generic/a/b")
            .join(INDEX_FILE_NAME)
            .is_file());
    }

    #[test]
    fn test_identical_content_is_deduplicated() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        let first = store.store(b"same bytes", "cover.jpg", "books").unwrap();
        let second = store.store(b"same bytes", "other-name.jpg", "books").unwrap();

        assert_eq!(first.outcome, StoreOutcome::Stored);
        assert!(second.already_existed());
        assert_eq!(first.relative_path, second.relative_path);
        assert_eq!(stored_files(&store.root_directory().join("books")).len(), 1);
    }

    #[test]
    fn test_different_content_gets_different_paths() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        let a = store.store(b"first cover", "a.jpg", "books").unwrap();
        let b = store.store(b"second cover", "a.jpg", "books").unwrap();

        assert_ne!(a.relative_path, b.relative_path);
        assert_eq!(b.outcome, StoreOutcome::Stored);
        assert_eq!(stored_files(&store.root_directory().join("books")).len(), 2);
    }

    #[test]
    fn test_dedup_is_scoped_to_directory() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        let in_books = store.store(b"shared", "x.png", "books").unwrap();
        let in_generic = store.store(b"shared", "x.png", "generic").unwrap();

        assert_eq!(in_generic.outcome, StoreOutcome::Stored);
        assert_ne!(in_books.relative_path, in_generic.relative_path);
    }

    #[test]
    fn test_stale_index_entry_is_ignored() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        let first = store.store(b"vanishing", "v.pdf", "documents").unwrap();
        fs::remove_file(store.root_directory().join(&first.relative_path)).unwrap();

        let second = store.store(b"vanishing", "v.pdf", "documents").unwrap();
        assert_eq!(second.outcome, StoreOutcome::Stored);
        assert_ne!(first.filename, second.filename);
        assert!(store.root_directory().join(&second.relative_path).is_file());
    }

    #[test]
    fn test_corrupt_index_does_not_fail_upload() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);
        let books = store.root_directory().join("books");
        fs::create_dir_all(&books).unwrap();
        fs::write(books.join(INDEX_FILE_NAME), "[[[").unwrap();

        let stored = store.store(b"content", "c.jpg", "books").unwrap();
        assert_eq!(stored.outcome, StoreOutcome::Stored);

        let again = store.store(b"content", "c.jpg", "books").unwrap();
        assert!(again.already_existed());
    }

    #[test]
    fn test_memory_index_can_be_injected() {
        let temp = TempDir::new().unwrap();
        let index = Arc::new(MemoryIndex::new());
        let store = UploadStore::new(temp.path(), index.clone()).unwrap();

        let first = store.store(b"in memory", "m.gif", "books").unwrap();
        let second = store.store(b"in memory", "m.gif", "books").unwrap();

        assert_eq!(first.relative_path, second.relative_path);
        assert_eq!(index.len(&store.root_directory().join("books")), 1);
        assert!(!store
            .root_directory()
            .join("books")
            .join(INDEX_FILE_NAME)
            .exists());
    }

    #[test]
    fn test_store_rejects_unsafe_directories() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        for dir in ["", "/abs", "../escape", "books/../..", "books//x", ".hidden", "a\\b"] {
            let result = store.store(b"x", "x.txt", dir);
            assert!(
                matches!(result, Err(FilesError::InvalidPath(_))),
                "expected {dir:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_tampered_index_filename_is_not_followed() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);
        let digest = ContentHash::compute(b"secret");
        let books = store.root_directory().join("books");
        fs::create_dir_all(&books).unwrap();
        fs::write(temp.path().join("outside.txt"), b"secret").unwrap();
        JsonFileIndex
            .record(&books, "../outside.txt", &digest)
            .unwrap();

        let stored = store.store(b"secret", "s.txt", "books").unwrap();
        assert_eq!(stored.outcome, StoreOutcome::Stored);
        assert!(stored.relative_path.starts_with("books/"));
        assert!(!stored.relative_path.contains(".."));
    }

    #[test]
    fn test_concurrent_uploads_keep_every_index_entry() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        let stored: Vec<StoredFile> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let store = &store;
                    scope.spawn(move || {
                        store
                            .store(format!("payload {i}").as_bytes(), "p.txt", "generic")
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let directory = store.root_directory().join("generic");
        for file in &stored {
            assert_eq!(
                JsonFileIndex.lookup(&directory, &file.digest).as_deref(),
                Some(file.filename.as_str())
            );
        }
        assert_eq!(stored_files(&directory).len(), 16);
    }

    #[test]
    fn test_concurrent_identical_uploads_store_once() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        let paths: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let store = &store;
                    scope.spawn(move || {
                        store
                            .store(b"one copy only", "one.pdf", "documents")
                            .unwrap()
                            .relative_path
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(
            stored_files(&store.root_directory().join("documents")).len(),
            1
        );
    }

    #[test]
    fn test_read_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);
        let binary: Vec<u8> = (0..=255).collect();

        let stored = store.store(&binary, "blob.bin", "generic").unwrap();
        assert_eq!(store.read(&stored.relative_path).unwrap(), binary);
    }

    #[test]
    fn test_read_missing_file() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);

        let result = store.read("books/nothing-here.jpg");
        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[test]
    fn test_read_hides_index_and_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);
        store.store(b"x", "x.jpg", "books").unwrap();

        assert!(matches!(
            store.read(&format!("books/{INDEX_FILE_NAME}")),
            Err(FilesError::InvalidPath(_))
        ));
        assert!(matches!(
            store.read("books/../../etc/passwd"),
            Err(FilesError::InvalidPath(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_read_rejects_symlink_out_of_root() {
        let outside = TempDir::new().unwrap();
        let secret = outside.path().join("secret.txt");
        fs::write(&secret, b"top secret").unwrap();

        let temp = TempDir::new().unwrap();
        let store = json_store(&temp);
        fs::create_dir_all(temp.path().join("books")).unwrap();
        std::os::unix::fs::symlink(&secret, temp.path().join("books/link.txt")).unwrap();

        assert!(matches!(
            store.read("books/link.txt"),
            Err(FilesError::InvalidPath(_))
        ));
    }

    /// Index whose writes always fail.
    #[derive(Debug)]
    struct FailingIndex;

    impl HashIndex for FailingIndex {
        fn lookup(&self, _directory: &Path, _digest: &ContentHash) -> Option<String> {
            None
        }

        fn record(
            &self,
            _directory: &Path,
            _filename: &str,
            _digest: &ContentHash,
        ) -> Result<(), FilesError> {
            Err(FilesError::Io(std::io::Error::new(
                ErrorKind::Other,
                "disk full",
            )))
        }
    }

    #[test]
    fn test_index_write_failure_still_stores() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::new(temp.path(), Arc::new(FailingIndex)).unwrap();

        let first = store.store(b"cover bytes", "cover.jpg", "books").unwrap();
        assert_eq!(first.outcome, StoreOutcome::Stored);
        assert_eq!(
            fs::read(store.root_directory().join(&first.relative_path)).unwrap(),
            b"cover bytes"
        );

        let second = store.store(b"cover bytes", "cover.jpg", "books").unwrap();
        assert_eq!(second.outcome, StoreOutcome::Stored);
        assert_ne!(first.filename, second.filename);
        assert_eq!(stored_files(&store.root_directory().join("books")).len(), 2);
    }

    #[test]
    fn test_directory_locks_released_after_store() {
        let temp = TempDir::new().unwrap();
        let store = UploadStore::new(temp.path(), Arc::new(MemoryIndex::new())).unwrap();

        for i in 0..20 {
            store
                .store(format!("day {i}").as_bytes(), "notes.txt", &format!("uploads/d{i}"))
                .unwrap();
        }
        store.store(b"cover", "cover.jpg", "books").unwrap();

        assert_eq!(store.locks.tracked(), 0);
    }

    #[test]
    fn test_detect_media_type() {
        assert_eq!(detect_media_type(Path::new("a/cover.jpg"), b""), "image/jpeg");
        assert_eq!(
            detect_media_type(Path::new("a/doc.pdf"), b""),
            "application/pdf"
        );

        let png_header = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(
            detect_media_type(Path::new("a/no-extension"), &png_header),
            "image/png"
        );
        assert_eq!(
            detect_media_type(Path::new("a/no-extension"), b"plain"),
            FALLBACK_MEDIA_TYPE
        );
    }
}
