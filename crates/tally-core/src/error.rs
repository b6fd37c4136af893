use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid code: {0}")]
    InvalidCode(String),
    #[error("invalid qa status: {0}")]
    InvalidQaStatus(String),
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Another writer holds the lock. The only retryable storage failure.
    #[error("storage is locked by a concurrent writer: {0}")]
    Contention(String),
    #[error("record already exists: {0}")]
    Conflict(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("storage operation failed: {0}")]
    Operation(String),
}

impl StorageError {
    /// Whether the failure was caused by a concurrent writer and may succeed on retry.
    pub fn is_contention(&self) -> bool {
        matches!(self, StorageError::Contention(_))
    }
}

impl From<CoreError> for StorageError {
    fn from(value: CoreError) -> Self {
        StorageError::InvalidData(value.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum IssueError {
    #[error("storage still contended after {attempts} attempts: {last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },
    #[error("issued code {0} does not exist")]
    NotFound(i64),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NumberingError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
    #[error("duplicated case found: TS# {ts}-TC# {tc}")]
    Duplicate { ts: u32, tc: u32 },
}
