//! # Exemplar Search
//!
//! Hybrid retrieval of refactoring examples: BM25 and vector candidates are
//! merged with Reciprocal Rank Fusion, reranked by a pluggable relevance
//! model, then resolved to their structured records.
//!
//! ```text
//! query
//!   ├──> SharedIndex::search ─────┐
//!   └──> VectorSearch::search ────┤
//!                                 v
//!                  ReciprocalRankFusion::fuse_weighted
//!                                 │ top fused_top_n
//!                                 v
//!                  RerankerAdapter::rerank (backend by name)
//!                                 │ top_k
//!                                 v
//!                  DocumentRepository::find
//! ```

mod config;
mod error;
mod fusion;
mod hybrid;
pub mod rerank;
mod vector;

pub use config::{RerankerConfig, RetrievalConfig};
pub use error::{RerankError, Result, SearchError, Stage};
pub use fusion::{FusionScores, ReciprocalRankFusion, DEFAULT_RRF_K};
pub use hybrid::{HybridRetriever, Retrieval, RetrievalStats, RetrievedExample};
pub use rerank::{build_backend, RerankBackend, RerankResult, RerankedDocument, RerankerAdapter};
pub use vector::VectorSearch;
