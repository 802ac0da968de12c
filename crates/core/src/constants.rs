//! Constants used throughout the Libris core crate.
//!
//! Directory names, category identifiers, default limits and MIME allowlists
//! live here so the policy, config and CLI agree on them.

use api_shared::Role;

/// Default private storage root when no explicit directory is configured.
pub const DEFAULT_STORAGE_DIR: &str = "private_uploads";

/// `tieuChuan` value selecting the book categories.
pub const BOOK_STANDARD: &str = "book";

/// `tieuChi` value for book cover images.
pub const IMAGE_CRITERION: &str = "image";

/// `tieuChi` value for book documents.
pub const DOCUMENT_CRITERION: &str = "document";

/// Directory for book cover images.
pub const BOOK_IMAGE_DIR: &str = "books";

/// Directory for book documents.
pub const BOOK_DOCUMENT_DIR: &str = "documents";

/// Directory under which generic uploads are namespaced by date and caller.
pub const GENERIC_DIR: &str = "uploads";

/// Roles allowed to upload when none are configured.
pub const DEFAULT_UPLOAD_ROLES: [Role; 2] = [Role::Admin, Role::Librarian];

pub const DEFAULT_MAX_IMAGE_MB: u64 = 5;
pub const DEFAULT_MAX_DOCUMENT_MB: u64 = 50;
pub const DEFAULT_MAX_GENERIC_MB: u64 = 10;

/// Largest limit any category may be configured with.
pub const MAX_CONFIGURABLE_MB: u64 = 1024;

pub const BYTES_PER_MB: u64 = 1024 * 1024;

pub const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp", "image/gif"];

pub const DOCUMENT_TYPES: &[&str] = &[
    "application/pdf",
    "application/epub+zip",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

pub const GENERIC_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "application/pdf",
    "application/epub+zip",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];
