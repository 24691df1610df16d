use thiserror::Error;

pub type Result<T> = std::result::Result<T, LexicalError>;

#[derive(Error, Debug)]
pub enum LexicalError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid argument: {0} must be > 0")]
    InvalidArgument(&'static str),

    #[error("Unsupported lexical index schema_version {found} (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },

    #[error("Tokenizer mismatch: index was built with '{persisted}', got '{supplied}'")]
    TokenizerMismatch { persisted: String, supplied: String },

    #[error("Corrupt index: {0}")]
    Corrupt(String),
}
