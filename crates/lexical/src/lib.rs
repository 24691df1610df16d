//! # Exemplar Lexical
//!
//! Okapi BM25 ranking over an in-memory corpus of document strings.
//!
//! ## Features
//!
//! - **Pluggable tokenization** via the [`Tokenizer`] strategy
//! - **Identifier-aware tokenizer** for source code ([`CodeTokenizer`])
//! - **Batch growth** with a single statistics rebuild per batch
//! - **Copy-on-write sharing** between readers and a writer ([`SharedIndex`])
//! - **Persistent storage** as schema-versioned JSON
//!
//! ## Architecture
//!
//! ```text
//! corpus: Vec<String>
//!     │
//!     ├──> Tokenizer (whitespace | code | custom)
//!     │      └─> token lists
//!     │
//!     ├──> Corpus statistics
//!     │      └─> postings, document lengths, idf
//!     │
//!     └──> search(query, top_n)
//!            └─> documents, best first
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use exemplar_lexical::{Bm25Index, CodeTokenizer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let index = Bm25Index::build(
//!         ["void reset() { resetState(); }", "int size() { return n; }"],
//!         Arc::new(CodeTokenizer),
//!     );
//!     index.save("bm25.json").await?;
//!
//!     for doc in index.search("reset state", 5)? {
//!         println!("{doc}");
//!     }
//!     Ok(())
//! }
//! ```

mod error;
mod index;
mod persist;
mod shared;
mod tokenizer;

pub use error::{LexicalError, Result};
pub use index::{Bm25Index, Bm25Params, ScoredDocument};
pub use persist::LEXICAL_INDEX_SCHEMA_VERSION;
pub use shared::SharedIndex;
pub use tokenizer::{tokenizer_by_id, CodeTokenizer, Tokenizer, WhitespaceTokenizer};
