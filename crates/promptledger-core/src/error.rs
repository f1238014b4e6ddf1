use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Session already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Session not found: {key}")]
    NotFound { key: String },

    #[error("Invalid session key: {0}")]
    InvalidKey(String),

    #[error("Concurrent update lost for session {key}; retry the operation")]
    Conflict { key: String },

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] serde_json::Error),

    #[error("Repository not initialized for promptledger (run `promptledger init`)")]
    NotInitialized,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Missing blob in snapshot tree: {0}")]
    MissingBlob(String),
}

impl CoreError {
    /// True for failures of the storage collaborator itself, as opposed to
    /// expected per-call outcomes such as a duplicate or unknown session.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            CoreError::Git(_)
                | CoreError::InvalidRecord(_)
                | CoreError::Io(_)
                | CoreError::Utf8(_)
                | CoreError::MissingBlob(_)
                | CoreError::Conflict { .. }
        )
    }
}
