use crate::error::{LexicalError, Result};
use crate::tokenizer::{Tokenizer, WhitespaceTokenizer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Okapi BM25 free parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization (0 = none, 1 = full).
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// A search hit with its position in the indexed corpus.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoredDocument {
    pub index: usize,
    pub document: String,
    pub score: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Posting {
    pub doc: u32,
    pub tf: u32,
}

/// Corpus statistics. Only the integer tables are persisted; `idf` and
/// `avg_doc_length` are always derived from them, so a reloaded index scores
/// bit-identically.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct CorpusStats {
    pub doc_lengths: Vec<u32>,
    /// Ordered so the persisted blob is byte-stable.
    pub postings: BTreeMap<String, Vec<Posting>>,
    #[serde(skip)]
    pub idf: HashMap<String, f32>,
    #[serde(skip)]
    pub avg_doc_length: f32,
}

impl CorpusStats {
    pub(crate) fn compute(tokenized: &[Vec<String>]) -> Self {
        let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();
        let mut doc_lengths = Vec::with_capacity(tokenized.len());

        for (doc, tokens) in tokenized.iter().enumerate() {
            doc_lengths.push(tokens.len() as u32);

            let mut freqs: HashMap<&str, u32> = HashMap::new();
            for token in tokens {
                *freqs.entry(token.as_str()).or_insert(0) += 1;
            }
            for (term, tf) in freqs {
                postings.entry(term.to_string()).or_default().push(Posting {
                    doc: doc as u32,
                    tf,
                });
            }
        }

        let mut stats = Self {
            doc_lengths,
            postings,
            ..Self::default()
        };
        stats.derive();
        stats
    }

    /// Recompute the floating-point tables from the integer ones.
    pub(crate) fn derive(&mut self) {
        let doc_count = self.doc_lengths.len();
        let total: u64 = self.doc_lengths.iter().map(|len| u64::from(*len)).sum();
        self.avg_doc_length = if doc_count == 0 {
            0.0
        } else {
            total as f32 / doc_count as f32
        };

        let n = doc_count as f32;
        self.idf = self
            .postings
            .iter()
            .map(|(term, list)| (term.clone(), bm25_idf(n, list.len() as f32)))
            .collect();
    }
}

/// Okapi BM25 index over an in-memory corpus.
///
/// `add_document` rebuilds every statistic from scratch. Batch insertions with
/// [`Bm25Index::add_documents`] before searching.
#[derive(Clone)]
pub struct Bm25Index {
    pub(crate) documents: Vec<String>,
    pub(crate) tokenized: Vec<Vec<String>>,
    pub(crate) stats: CorpusStats,
    pub(crate) params: Bm25Params,
    pub(crate) tokenizer: Arc<dyn Tokenizer>,
    pub(crate) version: u64,
}

impl fmt::Debug for Bm25Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bm25Index")
            .field("documents", &self.documents.len())
            .field("terms", &self.stats.postings.len())
            .field("tokenizer", &self.tokenizer.id())
            .field("params", &self.params)
            .field("version", &self.version)
            .finish()
    }
}

impl Bm25Index {
    pub fn build<I, S>(corpus: I, tokenizer: Arc<dyn Tokenizer>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let documents: Vec<String> = corpus.into_iter().map(Into::into).collect();
        let tokenized: Vec<Vec<String>> = documents
            .iter()
            .map(|doc| tokenizer.tokenize(doc))
            .collect();
        let stats = CorpusStats::compute(&tokenized);

        log::debug!(
            "Built BM25 index: {} documents, {} terms (tokenizer={})",
            documents.len(),
            stats.postings.len(),
            tokenizer.id()
        );

        Self {
            documents,
            tokenized,
            stats,
            params: Bm25Params::default(),
            tokenizer,
            version: 0,
        }
    }

    /// Build with the whitespace tokenizer.
    pub fn build_default<I, S>(corpus: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::build(corpus, Arc::new(WhitespaceTokenizer))
    }

    #[must_use]
    pub fn with_params(mut self, params: Bm25Params) -> Self {
        self.params = params;
        self
    }

    /// Top `top_n` documents for `query`, most relevant first.
    pub fn search(&self, query: &str, top_n: usize) -> Result<Vec<String>> {
        Ok(self
            .search_scored(query, top_n)?
            .into_iter()
            .map(|hit| hit.document)
            .collect())
    }

    /// Like [`Bm25Index::search`] but keeps scores and corpus positions.
    ///
    /// Returns `min(top_n, distinct documents)` hits ordered by descending
    /// score; equal scores keep corpus insertion order. A text indexed more
    /// than once is reported once, at its first position.
    pub fn search_scored(&self, query: &str, top_n: usize) -> Result<Vec<ScoredDocument>> {
        if top_n == 0 {
            return Err(LexicalError::InvalidArgument("top_n"));
        }
        if self.documents.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.scores(query);
        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then_with(|| a.cmp(&b)));

        let mut seen: HashSet<&str> = HashSet::new();
        Ok(order
            .into_iter()
            .filter(|&index| seen.insert(self.documents[index].as_str()))
            .take(top_n)
            .map(|index| ScoredDocument {
                index,
                document: self.documents[index].clone(),
                score: scores[index],
            })
            .collect())
    }

    /// BM25 score of every document against `query`, in corpus order.
    #[must_use]
    pub fn scores(&self, query: &str) -> Vec<f32> {
        let mut scores = vec![0.0_f32; self.documents.len()];
        if scores.is_empty() {
            return scores;
        }

        let Bm25Params { k1, b } = self.params;
        let avgdl = self.stats.avg_doc_length;

        for token in self.tokenizer.tokenize(query) {
            let Some(postings) = self.stats.postings.get(&token) else {
                continue;
            };
            let idf = self.stats.idf.get(&token).copied().unwrap_or(0.0);
            for posting in postings {
                let dl = self.stats.doc_lengths[posting.doc as usize] as f32;
                let tf = posting.tf as f32;
                let denom = tf + k1 * (1.0 - b + b * dl / avgdl);
                scores[posting.doc as usize] += idf * (tf * (k1 + 1.0)) / denom;
            }
        }
        scores
    }

    /// Append one document and rebuild all statistics.
    pub fn add_document(&mut self, document: impl Into<String>) {
        self.add_documents(std::iter::once(document));
    }

    /// Append a batch of documents with a single rebuild.
    ///
    /// Duplicates are indexed again; the index is a multiset.
    pub fn add_documents<I, S>(&mut self, documents: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.documents.len();
        for document in documents {
            let document = document.into();
            self.tokenized.push(self.tokenizer.tokenize(&document));
            self.documents.push(document);
        }
        if self.documents.len() == before {
            return;
        }

        self.stats = CorpusStats::compute(&self.tokenized);
        self.version += 1;
        log::debug!(
            "Rebuilt BM25 index after {} additions: {} documents (version {})",
            self.documents.len() - before,
            self.documents.len(),
            self.version
        );
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of rebuilds since construction.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    #[must_use]
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    #[must_use]
    pub fn tokenized(&self) -> &[Vec<String>] {
        &self.tokenized
    }

    #[must_use]
    pub const fn params(&self) -> Bm25Params {
        self.params
    }

    #[must_use]
    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }
}

fn bm25_idf(total_docs: f32, df: f32) -> f32 {
    ((total_docs - df + 0.5) / (df + 0.5) + 1.0).ln()
}
