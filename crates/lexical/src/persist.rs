use crate::error::{LexicalError, Result};
use crate::index::{Bm25Index, Bm25Params, CorpusStats};
use crate::tokenizer::{tokenizer_by_id, Tokenizer};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub const LEXICAL_INDEX_SCHEMA_VERSION: u32 = 1;

#[derive(Serialize)]
struct PersistedIndexRef<'a> {
    schema_version: u32,
    tokenizer: &'a str,
    params: Bm25Params,
    version: u64,
    documents: &'a [String],
    tokenized: &'a [Vec<String>],
    stats: &'a CorpusStats,
}

#[derive(Deserialize)]
struct PersistedIndex {
    schema_version: u32,
    tokenizer: String,
    params: Bm25Params,
    version: u64,
    documents: Vec<String>,
    tokenized: Vec<Vec<String>>,
    stats: CorpusStats,
}

impl Bm25Index {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let persisted = PersistedIndexRef {
            schema_version: LEXICAL_INDEX_SCHEMA_VERSION,
            tokenizer: self.tokenizer.id(),
            params: self.params,
            version: self.version,
            documents: &self.documents,
            tokenized: &self.tokenized,
            stats: &self.stats,
        };
        Ok(serde_json::to_vec_pretty(&persisted)?)
    }

    /// Decode a persisted index whose tokenizer is one of the built-ins.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let persisted = decode(bytes)?;
        let tokenizer = tokenizer_by_id(&persisted.tokenizer).ok_or_else(|| {
            LexicalError::TokenizerMismatch {
                persisted: persisted.tokenizer.clone(),
                supplied: "<builtin>".to_string(),
            }
        })?;
        restore(persisted, tokenizer)
    }

    pub fn from_bytes_with_tokenizer(bytes: &[u8], tokenizer: Arc<dyn Tokenizer>) -> Result<Self> {
        let persisted = decode(bytes)?;
        if persisted.tokenizer != tokenizer.id() {
            return Err(LexicalError::TokenizerMismatch {
                persisted: persisted.tokenizer,
                supplied: tokenizer.id().to_string(),
            });
        }
        restore(persisted, tokenizer)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        log::info!("Saving lexical index ({} documents) to {:?}", self.len(), path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = self.to_bytes()?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        log::info!("Loading lexical index from {:?}", path.as_ref());
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    pub async fn load_with_tokenizer(
        path: impl AsRef<Path>,
        tokenizer: Arc<dyn Tokenizer>,
    ) -> Result<Self> {
        log::info!("Loading lexical index from {:?}", path.as_ref());
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes_with_tokenizer(&bytes, tokenizer)
    }
}

fn decode(bytes: &[u8]) -> Result<PersistedIndex> {
    let persisted: PersistedIndex = serde_json::from_slice(bytes)?;
    if persisted.schema_version != LEXICAL_INDEX_SCHEMA_VERSION {
        return Err(LexicalError::UnsupportedSchema {
            found: persisted.schema_version,
            expected: LEXICAL_INDEX_SCHEMA_VERSION,
        });
    }
    Ok(persisted)
}

fn restore(persisted: PersistedIndex, tokenizer: Arc<dyn Tokenizer>) -> Result<Bm25Index> {
    let PersistedIndex {
        params,
        version,
        documents,
        tokenized,
        mut stats,
        ..
    } = persisted;

    let doc_count = documents.len();
    if tokenized.len() != doc_count || stats.doc_lengths.len() != doc_count {
        return Err(LexicalError::Corrupt(format!(
            "{doc_count} documents but {} token lists and {} lengths",
            tokenized.len(),
            stats.doc_lengths.len()
        )));
    }
    let out_of_range = stats
        .postings
        .values()
        .flatten()
        .any(|posting| posting.doc as usize >= doc_count);
    if out_of_range {
        return Err(LexicalError::Corrupt(
            "posting refers to a missing document".to_string(),
        ));
    }

    stats.derive();
    Ok(Bm25Index {
        documents,
        tokenized,
        stats,
        params,
        tokenizer,
        version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{CodeTokenizer, WhitespaceTokenizer};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    struct UpperTokenizer;

    impl Tokenizer for UpperTokenizer {
        fn id(&self) -> &str {
            "upper"
        }

        fn tokenize(&self, text: &str) -> Vec<String> {
            text.split_whitespace().map(str::to_uppercase).collect()
        }
    }

    #[tokio::test]
    async fn roundtrip_preserves_search_results() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("bm25.json");

        let mut index = Bm25Index::build(
            [
                "void reset() { resetPasswordText(false); }",
                "int computeLayout(int width) { return width * 2; }",
                "void resetState() { mState = null; }",
            ],
            Arc::new(CodeTokenizer),
        );
        index.add_document("boolean shouldLockout(long deadline) { return deadline > 0; }");
        index.save(&path).await.unwrap();

        let loaded = Bm25Index::load(&path).await.unwrap();
        assert_eq!(loaded.version(), index.version());
        assert_eq!(loaded.params(), index.params());
        for query in ["reset state", "layout width", "deadline lockout", "nothing"] {
            assert_eq!(
                loaded.search_scored(query, 4).unwrap(),
                index.search_scored(query, 4).unwrap()
            );
        }
    }

    #[test]
    fn custom_tokenizer_requires_explicit_load() {
        let index = Bm25Index::build(["a b"], Arc::new(UpperTokenizer));
        let bytes = index.to_bytes().unwrap();

        assert!(matches!(
            Bm25Index::from_bytes(&bytes),
            Err(LexicalError::TokenizerMismatch { .. })
        ));
        assert!(matches!(
            Bm25Index::from_bytes_with_tokenizer(&bytes, Arc::new(WhitespaceTokenizer)),
            Err(LexicalError::TokenizerMismatch { .. })
        ));

        let loaded = Bm25Index::from_bytes_with_tokenizer(&bytes, Arc::new(UpperTokenizer)).unwrap();
        assert_eq!(loaded.search("a", 1).unwrap(), vec!["a b"]);
    }

    #[test]
    fn serialization_is_byte_stable() {
        let corpus = [
            "void reset() { resetPasswordText(false); }",
            "int computeLayout(int width) { return width * 2; }",
            "void resetState() { mState = null; lockout = 0; }",
        ];
        let first = Bm25Index::build(corpus, Arc::new(CodeTokenizer)).to_bytes().unwrap();
        let second = Bm25Index::build(corpus, Arc::new(CodeTokenizer)).to_bytes().unwrap();
        assert_eq!(first, second);

        let reloaded = Bm25Index::from_bytes(&first).unwrap().to_bytes().unwrap();
        assert_eq!(reloaded, first);
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let index = Bm25Index::build_default(["a"]);
        let mut value: serde_json::Value = serde_json::from_slice(&index.to_bytes().unwrap()).unwrap();
        value["schema_version"] = serde_json::json!(99);
        let bytes = serde_json::to_vec(&value).unwrap();

        assert!(matches!(
            Bm25Index::from_bytes(&bytes),
            Err(LexicalError::UnsupportedSchema { found: 99, .. })
        ));
    }

    #[test]
    fn rejects_malformed_blob() {
        assert!(matches!(
            Bm25Index::from_bytes(b"not json"),
            Err(LexicalError::SerializationError(_))
        ));
    }

    #[test]
    fn rejects_inconsistent_tables() {
        let index = Bm25Index::build_default(["a", "b"]);
        let mut value: serde_json::Value = serde_json::from_slice(&index.to_bytes().unwrap()).unwrap();
        value["documents"] = serde_json::json!(["a"]);
        let bytes = serde_json::to_vec(&value).unwrap();

        assert!(matches!(
            Bm25Index::from_bytes(&bytes),
            Err(LexicalError::Corrupt(_))
        ));
    }
}
