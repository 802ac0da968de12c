use crate::upload::policy::{normalise_content_type, Category};
use crate::{CoreConfig, CoreError, CoreResult};
use api_shared::Identity;
use chrono::{NaiveDate, Utc};
use libris_files::{StoredFile, UploadStore};
use libris_types::NonEmptyText;
use std::sync::Arc;

/// One upload as received from a caller.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// `tieuChuan`
    pub standard: String,
    /// `tieuChi`
    pub criterion: String,
    pub original_filename: String,
    /// Declared MIME type, as sent by the client
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Validates uploads against their category policy and stores them.
///
/// Authorisation happens before this service is called; the identity is only
/// used to namespace generic uploads.
#[derive(Clone, Debug)]
pub struct UploadService {
    cfg: Arc<CoreConfig>,
    store: Arc<UploadStore>,
}

impl UploadService {
    pub fn new(cfg: Arc<CoreConfig>, store: Arc<UploadStore>) -> Self {
        Self { cfg, store }
    }

    pub fn store(&self) -> &UploadStore {
        &self.store
    }

    /// Validates and stores `request`, namespacing generic uploads under today's date.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidInput`] for a missing filename or unusable category fields
    /// - [`CoreError::FileTooLarge`] when the file exceeds the category limit
    /// - [`CoreError::UnsupportedMediaType`] when the declared type is not allowed
    /// - [`CoreError::Files`] when the store fails
    ///
    /// Every validation error is returned before anything touches the filesystem.
    pub fn upload(&self, identity: &Identity, request: UploadRequest) -> CoreResult<StoredFile> {
        self.upload_on(identity, request, Utc::now().date_naive())
    }

    /// Same as [`Self::upload`] with an explicit date for generic namespacing.
    pub fn upload_on(
        &self,
        identity: &Identity,
        request: UploadRequest,
        date: NaiveDate,
    ) -> CoreResult<StoredFile> {
        let original_filename = NonEmptyText::new(&request.original_filename)
            .map_err(|_| CoreError::InvalidInput("file has no filename".into()))?;

        let category = Category::resolve(&request.standard, &request.criterion)?;
        let content_type = normalise_content_type(&request.content_type);
        category
            .policy(self.cfg.size_limits())
            .check(request.bytes.len() as u64, &content_type)?;

        let directory = category.directory(identity, date);
        let stored = self
            .store
            .store(&request.bytes, original_filename.as_str(), &directory)?;

        tracing::info!(
            uploader = %identity.email,
            filepath = %stored.relative_path,
            already_existed = stored.already_existed(),
            "upload handled"
        );
        Ok(stored)
    }
}
