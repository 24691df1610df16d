use thiserror::Error;

pub type Result<T> = std::result::Result<T, RepositoryError>;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Unsupported repository schema_version {found} (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },

    #[error("Duplicate key rejected: {0:?}")]
    DuplicateKey(String),

    #[error("Malformed corpus: {0}")]
    MalformedCorpus(String),
}
