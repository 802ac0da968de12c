//! Libris File Storage
//!
//! Content-addressed upload storage for the library application.
//!
//! ## Storage Model
//!
//! Uploads land in a directory below a private storage root. Each directory keeps
//! a sidecar hash index mapping stored filenames to the SHA-256 digest of their
//! content:
//!
//! ```text
//! <storage_root>/
//! ├── books/
//! │   ├── .hash-index.json
//! │   └── 3f2a…c1-1729161600000.jpg
//! └── documents/
//!     ├── .hash-index.json
//!     └── 9b07…e4-1729161612345.pdf
//! ```
//!
//! Uploading bytes that already exist in a directory returns the existing path
//! instead of writing a second copy. New content is written under a random
//! `<token>-<millis>.<ext>` name.
//!
//! The index is advisory. A missing or corrupt index is treated as empty, and a
//! file written without an index entry is simply stored again on the next
//! identical upload.
//!
//! ## Example Usage
//!
//! ```no_run
//! use libris_files::{JsonFileIndex, UploadStore};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = UploadStore::new(Path::new("private_uploads"), Arc::new(JsonFileIndex))?;
//! let stored = store.store(b"%PDF-1.7 ...", "syllabus.pdf", "documents")?;
//! println!("{} ({:?})", stored.relative_path, stored.outcome);
//! # Ok(())
//! # }
//! ```

mod constants;
mod hash;
mod index;
mod locks;
mod naming;
mod store;

pub use constants::{FALLBACK_MEDIA_TYPE, INDEX_FILE_NAME};
pub use hash::ContentHash;
pub use index::{HashIndex, JsonFileIndex, MemoryIndex};
pub use locks::{DirectoryLease, DirectoryLocks};
pub use naming::{extension_of, generate_file_name};
pub use store::{detect_media_type, StoreOutcome, StoredFile, UploadStore};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory does not exist or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Path validation failed (potential directory traversal or unsafe path)
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Digest string is not 64 lowercase hex characters
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// Stored file does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Hash index could not be serialised
    #[error("Failed to encode hash index: {0}")]
    IndexEncode(#[from] serde_json::Error),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
