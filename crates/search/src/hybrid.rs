use crate::config::RetrievalConfig;
use crate::error::{Result, SearchError, Stage};
use crate::fusion::ReciprocalRankFusion;
use crate::rerank::RerankerAdapter;
use crate::vector::VectorSearch;
use exemplar_lexical::SharedIndex;
use exemplar_repository::{DocumentRepository, RefactoringRecord};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// One example handed to the generator.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RetrievedExample<R = RefactoringRecord> {
    pub document: String,
    pub fused_score: f64,
    pub rerank_score: f32,
    /// 0-based position after reranking.
    pub rank: usize,
    /// `None` when the repository has no record for `document`.
    pub record: Option<R>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RetrievalStats {
    pub lexical_candidates: usize,
    pub vector_candidates: usize,
    pub fused_candidates: usize,
    pub reranked: usize,
    pub returned: usize,
    pub unresolved: usize,
    pub lexical_ms: u64,
    pub vector_ms: u64,
    pub fusion_ms: u64,
    pub rerank_ms: u64,
    pub lookup_ms: u64,
    pub total_ms: u64,
    /// Stages that failed and were bypassed by configuration.
    pub skipped_stages: Vec<Stage>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Retrieval<R = RefactoringRecord> {
    pub examples: Vec<RetrievedExample<R>>,
    pub stats: RetrievalStats,
}

impl<R> Retrieval<R> {
    /// True when a stage was skipped and the ranking is built from fewer
    /// sources than configured.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.stats.skipped_stages.is_empty()
    }
}

/// Lexical + vector retrieval, fused with RRF, reranked, resolved to records.
pub struct HybridRetriever<R = RefactoringRecord> {
    config: RetrievalConfig,
    fusion: ReciprocalRankFusion,
    index: SharedIndex,
    vector: Arc<dyn VectorSearch>,
    reranker: RerankerAdapter,
    repository: Arc<DocumentRepository<R>>,
}

impl<R: Clone> HybridRetriever<R> {
    pub fn new(
        config: RetrievalConfig,
        index: SharedIndex,
        vector: Arc<dyn VectorSearch>,
        reranker: RerankerAdapter,
        repository: Arc<DocumentRepository<R>>,
    ) -> Result<Self> {
        config.validate()?;
        let fusion = ReciprocalRankFusion::new(config.rrf_k)?;
        Ok(Self {
            config,
            fusion,
            index,
            vector,
            reranker,
            repository,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Handle for growing the lexical index while retrievals run.
    #[must_use]
    pub const fn index(&self) -> &SharedIndex {
        &self.index
    }

    pub async fn retrieve(&self, query: &str) -> Result<Retrieval<R>> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let started = Instant::now();
        let mut stats = RetrievalStats::default();

        // 1. Lexical
        let t = Instant::now();
        let lexical = self.index.search(query, self.config.lexical_top_n)?;
        stats.lexical_candidates = lexical.len();
        stats.lexical_ms = elapsed_ms(t);
        log::debug!("Lexical: {} candidates", lexical.len());

        // 2. Vector
        let t = Instant::now();
        let vector = match self.vector_search(query).await {
            Ok(docs) => docs,
            Err(err) if self.config.allow_lexical_only => {
                log::warn!("Vector search skipped, continuing with lexical candidates only: {err}");
                stats.skipped_stages.push(Stage::Vector);
                Vec::new()
            }
            Err(err) => return Err(err),
        };
        stats.vector_candidates = vector.len();
        stats.vector_ms = elapsed_ms(t);
        log::debug!("Vector: {} candidates", vector.len());

        // 3. Fusion
        let t = Instant::now();
        let mut lists = vec![(self.config.lexical_weight, lexical)];
        if !stats.skipped_stages.contains(&Stage::Vector) {
            lists.push((self.config.vector_weight, vector));
        }
        let fused = self
            .fusion
            .fuse_weighted(&lists)
            .top_n(self.config.fused_top_n)?;
        stats.fused_candidates = fused.len();
        stats.fusion_ms = elapsed_ms(t);
        log::debug!("Fused: {} candidates", fused.len());

        // 4. Rerank
        let t = Instant::now();
        let candidates: Vec<String> = fused.iter().map(|(doc, _)| doc.clone()).collect();
        let reranked = self.reranker.rerank(query, &candidates).await?;
        let top = if reranked.is_empty() {
            Vec::new()
        } else {
            reranked.top_k(self.config.top_k)?
        };
        stats.reranked = reranked.len();
        stats.rerank_ms = elapsed_ms(t);

        // 5. Repository lookup
        let t = Instant::now();
        let mut examples = Vec::with_capacity(top.len());
        for entry in top {
            let record = self.repository.find(&entry.document).cloned();
            if record.is_none() {
                stats.unresolved += 1;
                log::warn!(
                    "No repository record for retrieved document (rank {})",
                    entry.rank
                );
            }
            examples.push(RetrievedExample {
                fused_score: fused[entry.doc_id].1,
                document: entry.document,
                rerank_score: entry.score,
                rank: entry.rank,
                record,
            });
        }
        stats.returned = examples.len();
        stats.lookup_ms = elapsed_ms(t);
        stats.total_ms = elapsed_ms(started);

        log::info!(
            "Retrieved {} examples ({} unresolved) in {} ms",
            stats.returned,
            stats.unresolved,
            stats.total_ms
        );
        Ok(Retrieval { examples, stats })
    }

    async fn vector_search(&self, query: &str) -> Result<Vec<String>> {
        let timeout = self.config.vector_timeout();
        let search = self.vector.search(
            query,
            self.config.vector_top_n,
            &self.config.vector_collection,
        );
        match tokio::time::timeout(timeout, search).await {
            Ok(Ok(docs)) => Ok(docs),
            Ok(Err(err)) => Err(SearchError::VectorSearch(format!("{err:#}"))),
            Err(_) => Err(SearchError::VectorTimeout(timeout)),
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
