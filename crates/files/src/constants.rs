/// Name of the sidecar index file kept in every upload directory.
pub const INDEX_FILE_NAME: &str = ".hash-index.json";

/// Media type reported when neither the extension nor the content identifies a file.
pub const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

/// Longest extension carried over from an original filename.
pub(crate) const MAX_EXTENSION_LEN: usize = 10;

/// Attempts at picking a fresh name before giving up on a write.
pub(crate) const MAX_NAME_ATTEMPTS: usize = 3;
