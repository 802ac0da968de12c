//! Upload categories and their size/type policies.
//!
//! The category is chosen by the `(tieuChuan, tieuChi)` pair sent with an upload:
//!
//! | standard | criterion  | directory                                       | types            |
//! |----------|------------|-------------------------------------------------|------------------|
//! | `book`   | `image`    | `books`                                         | images           |
//! | `book`   | `document` | `documents`                                     | PDF, EPUB, Word  |
//! | other    | other      | `uploads/<date>/<caller>/<standard>/<criterion>` | images, docs, sheets, text |

use crate::config::SizeLimits;
use crate::constants::{
    BOOK_DOCUMENT_DIR, BOOK_IMAGE_DIR, BOOK_STANDARD, BYTES_PER_MB, DOCUMENT_CRITERION,
    DOCUMENT_TYPES, GENERIC_DIR, GENERIC_TYPES, IMAGE_CRITERION, IMAGE_TYPES,
};
use crate::{CoreError, CoreResult};
use api_shared::Identity;
use chrono::NaiveDate;
use libris_types::PathSegment;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Category {
    /// Book cover image
    BookImage,
    /// Book document (PDF, EPUB, Word)
    BookDocument,
    /// Any other category-tagged upload
    Generic {
        standard: PathSegment,
        criterion: PathSegment,
    },
}

impl Category {
    /// Selects the category for a `(standard, criterion)` pair.
    ///
    /// Both values must be usable as directory names, since generic uploads are
    /// stored under them.
    pub fn resolve(standard: &str, criterion: &str) -> CoreResult<Self> {
        let standard = PathSegment::new(standard)
            .map_err(|e| CoreError::InvalidInput(format!("tieuChuan: {e}")))?;
        let criterion = PathSegment::new(criterion)
            .map_err(|e| CoreError::InvalidInput(format!("tieuChi: {e}")))?;

        let is_book = standard.as_str().eq_ignore_ascii_case(BOOK_STANDARD);
        if is_book && criterion.as_str().eq_ignore_ascii_case(IMAGE_CRITERION) {
            return Ok(Category::BookImage);
        }
        if is_book && criterion.as_str().eq_ignore_ascii_case(DOCUMENT_CRITERION) {
            return Ok(Category::BookDocument);
        }
        Ok(Category::Generic {
            standard,
            criterion,
        })
    }

    pub fn policy(&self, limits: &SizeLimits) -> UploadPolicy {
        match self {
            Category::BookImage => UploadPolicy {
                max_mb: limits.image_mb,
                allowed_types: IMAGE_TYPES,
            },
            Category::BookDocument => UploadPolicy {
                max_mb: limits.document_mb,
                allowed_types: DOCUMENT_TYPES,
            },
            Category::Generic { .. } => UploadPolicy {
                max_mb: limits.generic_mb,
                allowed_types: GENERIC_TYPES,
            },
        }
    }

    /// Storage directory relative to the storage root.
    ///
    /// Generic uploads are namespaced by `date` and the uploader so that one
    /// caller's files never deduplicate against another's.
    pub fn directory(&self, owner: &Identity, date: NaiveDate) -> String {
        match self {
            Category::BookImage => BOOK_IMAGE_DIR.to_owned(),
            Category::BookDocument => BOOK_DOCUMENT_DIR.to_owned(),
            Category::Generic {
                standard,
                criterion,
            } => format!(
                "{GENERIC_DIR}/{}/{}/{standard}/{criterion}",
                date.format("%Y-%m-%d"),
                owner_segment(&owner.email),
            ),
        }
    }
}

/// Size ceiling and MIME allowlist for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_mb: u64,
    pub allowed_types: &'static [&'static str],
}

impl UploadPolicy {
    pub fn max_bytes(&self) -> u64 {
        self.max_mb * BYTES_PER_MB
    }

    /// Checks size (`size <= max_bytes`) and then the declared content type.
    ///
    /// `content_type` should already be normalised with [`normalise_content_type`].
    pub fn check(&self, size: u64, content_type: &str) -> CoreResult<()> {
        if size > self.max_bytes() {
            return Err(CoreError::FileTooLarge {
                limit_mb: self.max_mb,
            });
        }
        if !self.allowed_types.contains(&content_type) {
            return Err(CoreError::UnsupportedMediaType {
                content_type: content_type.to_owned(),
                accepted: self.allowed_types.iter().map(|t| (*t).to_owned()).collect(),
            });
        }
        Ok(())
    }
}

/// Lowercased MIME essence without parameters (`"Text/Plain; charset=utf-8"` → `"text/plain"`).
pub fn normalise_content_type(raw: &str) -> String {
    raw.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Directory-safe form of an email: every character outside `[A-Za-z0-9._-]` becomes `_`.
///
/// A leading `.` is also replaced so the segment can never be hidden or relative.
pub fn owner_segment(email: &str) -> String {
    let mut segment: String = email
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if segment.starts_with('.') {
        segment.replace_range(0..1, "_");
    }
    if segment.is_empty() {
        segment.push_str("anonymous");
    }
    segment
}
