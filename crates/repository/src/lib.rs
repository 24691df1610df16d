//! # Exemplar Repository
//!
//! Maps retrieved document strings back to the refactoring records they were
//! built from, and turns mined-refactoring JSON into those documents.
//!
//! ```no_run
//! use exemplar_repository::{IngestOptions, RefactoringCorpus};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let corpus = RefactoringCorpus::load("commits.json").await?;
//!     let ingestion = corpus.entries(&IngestOptions::default());
//!     let documents = ingestion.documents();
//!     let repository = ingestion.into_repository();
//!
//!     assert!(documents.iter().all(|doc| repository.contains(doc)));
//!     repository.save("repository.json").await?;
//!     Ok(())
//! }
//! ```

mod comments;
mod corpus;
mod error;
mod record;
mod repository;

pub use comments::strip_java_comments;
pub use corpus::{document_key, IngestOptions, IngestReport, Ingestion, RefactoringCorpus};
pub use error::{RepositoryError, Result};
pub use record::RefactoringRecord;
pub use repository::{DocumentRepository, DuplicatePolicy, REPOSITORY_SCHEMA_VERSION};
