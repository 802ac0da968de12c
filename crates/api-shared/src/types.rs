use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Health check body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Body returned by a successful upload.
///
/// `filepath` is relative to the private storage root and is what callers keep
/// on their book or document records.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UploadRes {
    pub success: bool,
    pub message: String,
    pub filename: String,
    pub filepath: String,
}

/// Body returned by every failed request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ErrorRes {
    pub success: bool,
    pub message: String,
}

impl ErrorRes {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
