use libris_files::FilesError;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("File exceeds the {limit_mb} MB limit")]
    FileTooLarge { limit_mb: u64 },
    #[error(
        "Unsupported file type {content_type}; accepted types: {}",
        .accepted.join(", ")
    )]
    UnsupportedMediaType {
        content_type: String,
        accepted: Vec<String>,
    },
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error(transparent)]
    Files(#[from] FilesError),
}

impl CoreError {
    /// True when the request itself was wrong and repeating it cannot succeed.
    pub fn is_client_error(&self) -> bool {
        match self {
            CoreError::InvalidInput(_)
            | CoreError::FileTooLarge { .. }
            | CoreError::UnsupportedMediaType { .. } => true,
            CoreError::Files(FilesError::InvalidPath(_)) => true,
            _ => false,
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
