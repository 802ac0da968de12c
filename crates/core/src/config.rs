//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Request handling never reads environment variables; binaries read
//! them and hand the raw values to the `*_from_env_value` parsers below.

use crate::constants::{
    BYTES_PER_MB, DEFAULT_MAX_DOCUMENT_MB, DEFAULT_MAX_GENERIC_MB, DEFAULT_MAX_IMAGE_MB,
    DEFAULT_UPLOAD_ROLES, MAX_CONFIGURABLE_MB,
};
use crate::{CoreError, CoreResult};
use api_shared::Role;
use std::path::{Path, PathBuf};

/// Extra request body allowance on top of the largest file limit, for multipart framing
/// and the category fields.
const REQUEST_OVERHEAD_BYTES: u64 = BYTES_PER_MB;

/// Per-category upload ceilings in MB (1 MB = 1024 * 1024 bytes).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SizeLimits {
    pub image_mb: u64,
    pub document_mb: u64,
    pub generic_mb: u64,
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            image_mb: DEFAULT_MAX_IMAGE_MB,
            document_mb: DEFAULT_MAX_DOCUMENT_MB,
            generic_mb: DEFAULT_MAX_GENERIC_MB,
        }
    }
}

impl SizeLimits {
    /// Resolve limits from the raw `LIBRIS_MAX_{IMAGE,DOCUMENT,GENERIC}_MB` values.
    ///
    /// Unset or empty values fall back to the defaults.
    pub fn from_env_values(
        image: Option<String>,
        document: Option<String>,
        generic: Option<String>,
    ) -> CoreResult<Self> {
        Ok(Self {
            image_mb: megabytes_from_env_value("LIBRIS_MAX_IMAGE_MB", image, DEFAULT_MAX_IMAGE_MB)?,
            document_mb: megabytes_from_env_value(
                "LIBRIS_MAX_DOCUMENT_MB",
                document,
                DEFAULT_MAX_DOCUMENT_MB,
            )?,
            generic_mb: megabytes_from_env_value(
                "LIBRIS_MAX_GENERIC_MB",
                generic,
                DEFAULT_MAX_GENERIC_MB,
            )?,
        })
    }

    pub fn largest_mb(&self) -> u64 {
        self.image_mb.max(self.document_mb).max(self.generic_mb)
    }

    fn validate(&self) -> CoreResult<()> {
        for (name, mb) in [
            ("image", self.image_mb),
            ("document", self.document_mb),
            ("generic", self.generic_mb),
        ] {
            if mb == 0 || mb > MAX_CONFIGURABLE_MB {
                return Err(CoreError::InvalidConfig(format!(
                    "{name} size limit must be between 1 and {MAX_CONFIGURABLE_MB} MB, got {mb}"
                )));
            }
        }
        Ok(())
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    storage_dir: PathBuf,
    upload_roles: Vec<Role>,
    enforce_owner_paths: bool,
    size_limits: SizeLimits,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if no upload role is given or a size limit is out
    /// of range.
    pub fn new(
        storage_dir: PathBuf,
        upload_roles: Vec<Role>,
        enforce_owner_paths: bool,
        size_limits: SizeLimits,
    ) -> CoreResult<Self> {
        if upload_roles.is_empty() {
            return Err(CoreError::InvalidConfig(
                "at least one upload role is required".into(),
            ));
        }
        size_limits.validate()?;

        Ok(Self {
            storage_dir,
            upload_roles,
            enforce_owner_paths,
            size_limits,
        })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn upload_roles(&self) -> &[Role] {
        &self.upload_roles
    }

    /// Whether readers are restricted to paths under their own email segment.
    pub fn enforce_owner_paths(&self) -> bool {
        self.enforce_owner_paths
    }

    pub fn size_limits(&self) -> &SizeLimits {
        &self.size_limits
    }

    /// Request body ceiling for the upload endpoint.
    ///
    /// Larger than every category limit, so oversized files reach the policy check and get
    /// a message naming their category's limit.
    pub fn max_request_bytes(&self) -> usize {
        let bytes = self.size_limits.largest_mb() * BYTES_PER_MB + REQUEST_OVERHEAD_BYTES;
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }
}

/// Create the storage root if needed and return it.
pub fn ensure_storage_dir(path: &Path) -> CoreResult<PathBuf> {
    if path.exists() && !path.is_dir() {
        return Err(CoreError::InvalidConfig(format!(
            "storage path is not a directory: {}",
            path.display()
        )));
    }
    std::fs::create_dir_all(path).map_err(CoreError::StorageDirCreation)?;
    Ok(path.to_path_buf())
}

/// Parse a comma-separated role list such as `"1,2"` or `"admin, librarian"`.
///
/// If `value` is `None` or empty/whitespace, returns the default upload roles.
pub fn upload_roles_from_env_value(value: Option<String>) -> CoreResult<Vec<Role>> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let Some(value) = value else {
        return Ok(DEFAULT_UPLOAD_ROLES.to_vec());
    };

    let mut roles = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let role = part
            .parse::<Role>()
            .map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        if !roles.contains(&role) {
            roles.push(role);
        }
    }
    Ok(roles)
}

/// Parse a boolean flag; unset or empty means `false`.
pub fn flag_from_env_value(name: &str, value: Option<String>) -> CoreResult<bool> {
    let Some(value) = value.map(|v| v.trim().to_ascii_lowercase()) else {
        return Ok(false);
    };
    match value.as_str() {
        "" | "0" | "false" | "no" | "off" => Ok(false),
        "1" | "true" | "yes" | "on" => Ok(true),
        other => Err(CoreError::InvalidConfig(format!(
            "{name} must be true or false, got {other:?}"
        ))),
    }
}

/// Parse a whole number of megabytes, falling back to `default` when unset or empty.
pub fn megabytes_from_env_value(
    name: &str,
    value: Option<String>,
    default: u64,
) -> CoreResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(default),
        Some(v) => v.parse::<u64>().map_err(|_| {
            CoreError::InvalidConfig(format!("{name} must be a whole number of MB, got {v:?}"))
        }),
    }
}
