//! # Libris Core
//!
//! Core business logic for the Libris upload store.
//!
//! This crate decides where an upload goes and whether it is acceptable:
//! - Upload categories, their directories, size ceilings and MIME allowlists
//! - Storing accepted uploads through the deduplicating [`libris_files::UploadStore`]
//! - Reading stored files back, with the optional owner restriction
//!
//! **No API concerns**: HTTP servers, multipart parsing and token extraction belong in
//! `api-rest` or `api-shared`.

pub mod access;
pub mod config;
pub mod constants;
pub mod error;
pub mod upload;

pub use access::{check_file_access, FileAccessService, StoredContent};
pub use config::{CoreConfig, SizeLimits};
pub use error::{CoreError, CoreResult};
pub use upload::{Category, UploadPolicy, UploadRequest, UploadService};

use libris_files::{JsonFileIndex, UploadStore};
use std::sync::Arc;

/// Opens the store under the configured storage root, backed by on-disk hash indexes.
///
/// The storage root is created if it does not exist yet.
pub fn open_store(cfg: &CoreConfig) -> CoreResult<Arc<UploadStore>> {
    let root = config::ensure_storage_dir(cfg.storage_dir())?;
    let store = UploadStore::new(&root, Arc::new(JsonFileIndex))?;
    Ok(Arc::new(store))
}
