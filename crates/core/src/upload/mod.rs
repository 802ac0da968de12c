//! Category-aware uploads into the deduplicating store.

pub mod policy;
pub mod service;

pub use policy::{normalise_content_type, owner_segment, Category, UploadPolicy};
pub use service::{UploadRequest, UploadService};
