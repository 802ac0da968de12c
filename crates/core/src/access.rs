//! Read access to stored uploads.

use crate::upload::policy::owner_segment;
use crate::{CoreConfig, CoreError, CoreResult};
use api_shared::{Identity, Role};
use libris_files::{detect_media_type, UploadStore};
use std::path::Path;
use std::sync::Arc;

/// Bytes of a stored file together with the media type to serve it as.
#[derive(Debug, Clone)]
pub struct StoredContent {
    pub bytes: Vec<u8>,
    pub media_type: String,
}

#[derive(Clone, Debug)]
pub struct FileAccessService {
    cfg: Arc<CoreConfig>,
    store: Arc<UploadStore>,
}

impl FileAccessService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<UploadStore>) -> Self {
        Self { cfg, store }
    }

    /// Reads the file at the root-relative `relative_path` for `identity`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::AccessDenied`] if the owner restriction is on and rejects the path
    /// - [`CoreError::Files`] for an invalid path, a missing file, or an I/O failure
    pub fn read(&self, identity: &Identity, relative_path: &str) -> CoreResult<StoredContent> {
        if self.cfg.enforce_owner_paths() {
            check_file_access(identity, relative_path)?;
        }

        let bytes = self.store.read(relative_path)?;
        let media_type = detect_media_type(Path::new(relative_path), &bytes);
        tracing::debug!(reader = %identity.email, path = relative_path, "serving stored file");
        Ok(StoredContent { bytes, media_type })
    }
}

/// Readers may only open paths with a segment equal to their own email segment.
///
/// Admins and librarians may open any path.
pub fn check_file_access(identity: &Identity, relative_path: &str) -> CoreResult<()> {
    if identity.role != Role::Reader {
        return Ok(());
    }
    let own = owner_segment(&identity.email);
    if relative_path.split('/').any(|segment| segment == own) {
        return Ok(());
    }
    Err(CoreError::AccessDenied(format!(
        "{} may not read {relative_path}",
        identity.email
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SizeLimits;
    use libris_files::{FilesError, JsonFileIndex};
    use std::fs;
    use tempfile::TempDir;

    fn service(temp: &TempDir, enforce: bool) -> FileAccessService {
        let cfg = Arc::new(
            CoreConfig::new(
                temp.path().to_path_buf(),
                vec![Role::Admin, Role::Librarian],
                enforce,
                SizeLimits::default(),
            )
            .unwrap(),
        );
        let store = Arc::new(UploadStore::new(temp.path(), Arc::new(JsonFileIndex)).unwrap());
        FileAccessService::new(cfg, store)
    }

    fn write(temp: &TempDir, relative: &str, bytes: &[u8]) {
        let path = temp.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_reader_restricted_to_own_segment() {
        let reader = Identity::new("reader@uni.edu", Role::Reader);

        assert!(check_file_access(&reader, "uploads/2024-01-01/reader_uni.edu/TC/C/a.pdf").is_ok());
        assert!(matches!(
            check_file_access(&reader, "uploads/2024-01-01/other_uni.edu/TC/C/a.pdf"),
            Err(CoreError::AccessDenied(_))
        ));
        assert!(check_file_access(&reader, "books/cover.jpg").is_err());
    }

    #[test]
    fn test_staff_unrestricted() {
        let admin = Identity::new("admin@uni.edu", Role::Admin);
        let librarian = Identity::new("lib@uni.edu", Role::Librarian);

        assert!(check_file_access(&admin, "books/cover.jpg").is_ok());
        assert!(check_file_access(&librarian, "uploads/x/someone/a/b/c.txt").is_ok());
    }

    #[test]
    fn test_read_returns_bytes_and_media_type() {
        let temp = TempDir::new().unwrap();
        write(&temp, "books/cover.png", b"\x89PNG\r\n\x1a\n....");
        let reader = Identity::new("reader@uni.edu", Role::Reader);

        let content = service(&temp, false).read(&reader, "books/cover.png").unwrap();
        assert_eq!(content.media_type, "image/png");
        assert_eq!(content.bytes, b"\x89PNG\r\n\x1a\n....");
    }

    #[test]
    fn test_owner_restriction_applies_only_when_enabled() {
        let temp = TempDir::new().unwrap();
        write(&temp, "books/cover.jpg", b"jpeg");
        let reader = Identity::new("reader@uni.edu", Role::Reader);

        assert!(service(&temp, false).read(&reader, "books/cover.jpg").is_ok());
        assert!(matches!(
            service(&temp, true).read(&reader, "books/cover.jpg"),
            Err(CoreError::AccessDenied(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let temp = TempDir::new().unwrap();
        let admin = Identity::new("admin@uni.edu", Role::Admin);

        assert!(matches!(
            service(&temp, false).read(&admin, "books/none.jpg"),
            Err(CoreError::Files(FilesError::NotFound(_)))
        ));
    }
}
