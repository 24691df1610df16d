use exemplar_lexical::LexicalError;
use exemplar_repository::RepositoryError;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SearchError>;

/// Pipeline stage a failure is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Lexical,
    Vector,
    Fusion,
    Rerank,
    Repository,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Lexical => "lexical search",
            Self::Vector => "vector search",
            Self::Fusion => "fusion",
            Self::Rerank => "rerank",
            Self::Repository => "repository lookup",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Lexical index error: {0}")]
    Lexical(#[from] LexicalError),

    #[error("Vector search failed: {0}")]
    VectorSearch(String),

    #[error("Vector search timed out after {0:?}")]
    VectorTimeout(Duration),

    #[error("Invalid fusion argument: {0}")]
    Fusion(&'static str),

    #[error("Rerank error: {0}")]
    Rerank(#[from] RerankError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Empty query")]
    EmptyQuery,
}

impl SearchError {
    /// The stage that failed, when the error came out of one.
    #[must_use]
    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::Lexical(_) => Some(Stage::Lexical),
            Self::VectorSearch(_) | Self::VectorTimeout(_) => Some(Stage::Vector),
            Self::Fusion(_) => Some(Stage::Fusion),
            Self::Rerank(_) => Some(Stage::Rerank),
            Self::Repository(_) => Some(Stage::Repository),
            Self::Config(_) | Self::EmptyQuery => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum RerankError {
    #[error("Reranker configuration error: {0}")]
    Config(String),

    #[error("{what} is {len} characters, over the {max} character limit")]
    InputTooLong { what: String, len: usize, max: usize },

    #[error("Invalid rerank argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Reranker backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },

    #[error("Reranker timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl RerankError {
    pub(crate) fn backend(backend: &str, message: impl Into<String>) -> Self {
        Self::Backend {
            backend: backend.to_string(),
            message: message.into(),
        }
    }
}
