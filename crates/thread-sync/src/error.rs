use thiserror::Error;
use thread_core::TreeError;

/// Failures reported by a [`ThreadStore`](crate::store::ThreadStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization(error.to_string())
    }
}

impl From<TreeError> for StoreError {
    fn from(error: TreeError) -> Self {
        match error {
            TreeError::NotFound(id) => Self::NotFound(format!("message {id}")),
            TreeError::InvalidOperation(message) => Self::Rejected(message),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// The store refused or failed a write; local state was rolled back
    #[error("Remote failure: {0}")]
    RemoteFailure(String),

    /// A cut or move stored its copy but could not delete the original.
    /// The copy stays and the cut payload is already spent.
    #[error("Copied to {created}, but the original was kept: {reason}")]
    OriginalKept { created: uuid::Uuid, reason: String },

    #[error("Aborted")]
    Aborted,
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn thread_not_found(id: uuid::Uuid) -> Self {
        Self::NotFound(format!("thread {id}"))
    }
}

impl From<TreeError> for SyncError {
    fn from(error: TreeError) -> Self {
        match error {
            TreeError::NotFound(id) => Self::NotFound(format!("message {id}")),
            TreeError::InvalidOperation(message) => Self::InvalidOperation(message),
        }
    }
}

/// Reads from the store; writes map every store error to `RemoteFailure`.
impl From<StoreError> for SyncError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::RemoteFailure(other.to_string()),
        }
    }
}
