//! Second-pass scoring of fused candidates.
//!
//! A [`RerankBackend`] scores a short candidate list against a query; the
//! [`RerankerAdapter`] in front of it enforces input limits, the call timeout,
//! caller-declared document ids and the empty-input shortcut, so every backend
//! sees the same contract.

mod cross_encoder;
mod late_interaction;
mod lexical;
mod llm;

pub use cross_encoder::CrossEncoderBackend;
pub use late_interaction::{maxsim, LateInteractionBackend};
pub use lexical::LexicalBackend;
pub use llm::LlmBackend;

use crate::config::RerankerConfig;
use crate::error::RerankError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

type Result<T> = std::result::Result<T, RerankError>;

/// Backend names accepted by [`build_backend`].
pub const BACKEND_NAMES: &[&str] = &["cross-encoder", "late-interaction", "llm", "lexical"];

/// One scored candidate. `rank` is dense and 0-based: 0 is the best.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RerankedDocument {
    pub document: String,
    pub doc_id: usize,
    pub score: f32,
    pub rank: usize,
}

/// Candidates ordered by backend score, best first.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RerankResult {
    entries: Vec<RerankedDocument>,
}

impl RerankResult {
    /// Order `candidates` by `scores` (same length, same order); ties keep
    /// candidate order. Document ids are candidate positions.
    pub fn from_scores(candidates: &[String], scores: &[f32]) -> Result<Self> {
        if candidates.len() != scores.len() {
            return Err(RerankError::InvalidArgument("one score per candidate"));
        }
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

        let entries = order
            .into_iter()
            .enumerate()
            .map(|(rank, idx)| RerankedDocument {
                document: candidates[idx].clone(),
                doc_id: idx,
                score: scores[idx],
                rank,
            })
            .collect();
        Ok(Self { entries })
    }

    /// The `k` best entries.
    pub fn top_k(&self, k: usize) -> Result<Vec<RerankedDocument>> {
        if k == 0 {
            return Err(RerankError::InvalidArgument("k must be positive"));
        }
        Ok(self.entries.iter().take(k).cloned().collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RerankedDocument> {
        self.entries.iter()
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<RerankedDocument> {
        self.entries
    }

    fn relabel(&mut self, ids: &[usize]) {
        for entry in &mut self.entries {
            entry.doc_id = ids[entry.doc_id];
        }
    }
}

/// A relevance model that orders candidates for a query.
#[async_trait]
pub trait RerankBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Score every candidate and return them best first, with `doc_id` set to
    /// the candidate's position in `candidates`.
    async fn score_and_rank(&self, query: &str, candidates: &[String]) -> Result<RerankResult>;
}

/// Construct the backend named by `config.backend`.
pub fn build_backend(config: &RerankerConfig) -> Result<Arc<dyn RerankBackend>> {
    let backend: Arc<dyn RerankBackend> = match config.backend.as_str() {
        "cross-encoder" => Arc::new(CrossEncoderBackend::from_config(config)?),
        "late-interaction" => Arc::new(LateInteractionBackend::from_config(config)?),
        "llm" => Arc::new(LlmBackend::from_config(config)?),
        "lexical" => Arc::new(LexicalBackend::default()),
        other => {
            return Err(RerankError::Config(format!(
                "unknown rerank backend '{other}' (expected one of: {})",
                BACKEND_NAMES.join(", ")
            )))
        }
    };
    log::debug!("Rerank backend: {}", backend.name());
    Ok(backend)
}

/// Uniform front for every backend.
#[derive(Clone)]
pub struct RerankerAdapter {
    backend: Arc<dyn RerankBackend>,
    max_input_chars: usize,
    timeout: Duration,
}

impl std::fmt::Debug for RerankerAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RerankerAdapter")
            .field("backend", &self.backend.name())
            .field("max_input_chars", &self.max_input_chars)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl RerankerAdapter {
    pub fn from_config(config: &RerankerConfig) -> Result<Self> {
        if config.max_input_chars == 0 {
            return Err(RerankError::Config("max_input_chars must be positive".to_string()));
        }
        Ok(Self::new(build_backend(config)?, config.max_input_chars, config.timeout()))
    }

    #[must_use]
    pub fn new(backend: Arc<dyn RerankBackend>, max_input_chars: usize, timeout: Duration) -> Self {
        Self {
            backend,
            max_input_chars,
            timeout,
        }
    }

    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Rerank with ids `0..candidates.len()`.
    pub async fn rerank(&self, query: &str, candidates: &[String]) -> Result<RerankResult> {
        if candidates.is_empty() {
            return Ok(RerankResult::default());
        }
        self.check_lengths(query, candidates)?;

        let result = tokio::time::timeout(
            self.timeout,
            self.backend.score_and_rank(query, candidates),
        )
        .await
        .map_err(|_| RerankError::Timeout(self.timeout))??;

        self.check_output(candidates, &result)?;
        log::debug!(
            "Reranked {} candidates with {}",
            candidates.len(),
            self.backend.name()
        );
        Ok(result)
    }

    /// Every candidate exactly once, ranked `0..n` in order, with its own text.
    fn check_output(&self, candidates: &[String], result: &RerankResult) -> Result<()> {
        let fail = |message: String| -> Result<()> { Err(RerankError::backend(self.backend.name(), message)) };
        if result.len() != candidates.len() {
            return fail(format!(
                "returned {} results for {} candidates",
                result.len(),
                candidates.len()
            ));
        }
        let mut seen = vec![false; candidates.len()];
        for (position, entry) in result.iter().enumerate() {
            let Some(slot) = seen.get_mut(entry.doc_id) else {
                return fail(format!("returned document id {} outside the candidate list", entry.doc_id));
            };
            if std::mem::replace(slot, true) {
                return fail(format!("returned document id {} more than once", entry.doc_id));
            }
            if entry.rank != position {
                return fail(format!("rank {} at position {position}", entry.rank));
            }
            if entry.document != candidates[entry.doc_id] {
                return fail(format!("document id {} does not match its candidate", entry.doc_id));
            }
        }
        Ok(())
    }

    /// Rerank, reporting `ids[i]` as the id of `candidates[i]`.
    pub async fn rerank_with_ids(
        &self,
        query: &str,
        candidates: &[String],
        ids: &[usize],
    ) -> Result<RerankResult> {
        if ids.len() != candidates.len() {
            return Err(RerankError::InvalidArgument("one id per candidate"));
        }
        let mut result = self.rerank(query, candidates).await?;
        result.relabel(ids);
        Ok(result)
    }

    fn check_lengths(&self, query: &str, candidates: &[String]) -> Result<()> {
        let max = self.max_input_chars;
        let len = query.chars().count();
        if len > max {
            return Err(RerankError::InputTooLong {
                what: "query".to_string(),
                len,
                max,
            });
        }
        for (idx, candidate) in candidates.iter().enumerate() {
            let len = candidate.chars().count();
            if len > max {
                return Err(RerankError::InputTooLong {
                    what: format!("candidate {idx}"),
                    len,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Bearer token from the environment variable named in the config.
pub(crate) fn api_key_from_env(config: &RerankerConfig) -> Result<Option<String>> {
    let Some(var) = config.api_key_env.as_deref() else {
        return Ok(None);
    };
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(Some(key)),
        _ => Err(RerankError::Config(format!(
            "api_key_env '{var}' is not set for rerank backend '{}'",
            config.backend
        ))),
    }
}

pub(crate) fn required<'a>(config: &'a RerankerConfig, field: &str, value: &'a Option<String>) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            RerankError::Config(format!(
                "rerank backend '{}' requires '{field}'",
                config.backend
            ))
        })
}

pub(crate) fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .build()
        .map_err(|err| RerankError::Config(format!("failed to build HTTP client: {err}")))
}

/// Turn a non-success response into a backend error carrying status and body.
pub(crate) async fn check_status(backend: &str, resp: reqwest::Response) -> Result<reqwest::Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(RerankError::backend(backend, format!("{status} - {body}")))
}
