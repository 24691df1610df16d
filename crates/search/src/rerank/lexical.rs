use super::{RerankBackend, RerankResult, Result};
use async_trait::async_trait;
use exemplar_lexical::{Bm25Index, Bm25Params, CodeTokenizer, Tokenizer};
use std::sync::Arc;

/// In-process BM25 over the candidate list alone.
///
/// Statistics come from the candidates, not the full corpus, so terms that
/// separate the candidates weigh most. Needs no network.
#[derive(Clone)]
pub struct LexicalBackend {
    tokenizer: Arc<dyn Tokenizer>,
    params: Bm25Params,
}

impl LexicalBackend {
    #[must_use]
    pub fn new(tokenizer: Arc<dyn Tokenizer>, params: Bm25Params) -> Self {
        Self { tokenizer, params }
    }
}

impl Default for LexicalBackend {
    fn default() -> Self {
        Self::new(Arc::new(CodeTokenizer), Bm25Params::default())
    }
}

#[async_trait]
impl RerankBackend for LexicalBackend {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score_and_rank(&self, query: &str, candidates: &[String]) -> Result<RerankResult> {
        let index = Bm25Index::build(candidates.iter().cloned(), Arc::clone(&self.tokenizer))
            .with_params(self.params);
        RerankResult::from_scores(candidates, &index.scores(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn ranks_overlapping_candidates_first() {
        let candidates = vec![
            "int computeLayout(int width) { return width; }".to_string(),
            "void resetPasswordText(boolean animate) {}".to_string(),
            "void resetState() {}".to_string(),
        ];
        let result = LexicalBackend::default()
            .score_and_rank("reset password", &candidates)
            .await
            .unwrap();

        let ids: Vec<_> = result.iter().map(|e| e.doc_id).collect();
        assert_eq!(ids, vec![1, 2, 0]);
        assert_eq!(result.iter().last().map(|e| e.score), Some(0.0));
    }
}
