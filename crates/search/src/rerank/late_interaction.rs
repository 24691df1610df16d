use super::{api_key_from_env, check_status, http_client, required, RerankBackend, RerankResult, Result};
use crate::config::RerankerConfig;
use crate::error::RerankError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const NAME: &str = "late-interaction";

/// ColBERT-style reranking: a hosted encoder returns one vector per token,
/// scoring is MaxSim computed here.
pub struct LateInteractionBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct EncodeRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
}

#[derive(Deserialize)]
struct EncodeResponse {
    query: Vec<Vec<f32>>,
    documents: Vec<Vec<Vec<f32>>>,
}

impl LateInteractionBackend {
    pub fn from_config(config: &RerankerConfig) -> Result<Self> {
        let endpoint = required(config, "endpoint", &config.endpoint)?.to_string();
        let model = required(config, "model", &config.model)?.to_string();
        Ok(Self {
            http: http_client()?,
            endpoint,
            model,
            api_key: api_key_from_env(config)?,
        })
    }
}

#[async_trait]
impl RerankBackend for LateInteractionBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn score_and_rank(&self, query: &str, candidates: &[String]) -> Result<RerankResult> {
        let request = EncodeRequest {
            model: &self.model,
            query,
            documents: candidates,
        };
        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = check_status(NAME, builder.send().await?).await?;
        let encoded: EncodeResponse = resp.json().await?;

        if encoded.documents.len() != candidates.len() {
            return Err(RerankError::backend(
                NAME,
                format!(
                    "encoded {} documents for {} candidates",
                    encoded.documents.len(),
                    candidates.len()
                ),
            ));
        }
        let scores: Vec<f32> = encoded
            .documents
            .iter()
            .map(|doc| maxsim(&encoded.query, doc))
            .collect();
        RerankResult::from_scores(candidates, &scores)
    }
}

/// Sum over query tokens of the best dot product with any document token.
///
/// An empty side scores 0. Vectors of different lengths are compared over
/// their common prefix.
#[must_use]
pub fn maxsim(query: &[Vec<f32>], doc: &[Vec<f32>]) -> f32 {
    if doc.is_empty() {
        return 0.0;
    }
    query
        .iter()
        .map(|q| {
            doc.iter()
                .map(|d| dot(q, d))
                .fold(f32::NEG_INFINITY, f32::max)
        })
        .sum()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maxsim_takes_best_match_per_query_token() {
        let query = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let doc = vec![vec![0.5, 0.0], vec![0.9, 0.1], vec![0.0, 0.3]];
        // token 0 best = 0.9, token 1 best = 0.3
        assert!((maxsim(&query, &doc) - 1.2).abs() < 1e-6);
    }

    #[test]
    fn maxsim_prefers_aligned_documents() {
        let query = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let aligned = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]];
        let partial = vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 1.0]];
        assert!(maxsim(&query, &aligned) > maxsim(&query, &partial));
    }

    #[test]
    fn empty_sides_score_zero() {
        assert_eq!(maxsim(&[], &[vec![1.0]]), 0.0);
        assert_eq!(maxsim(&[vec![1.0]], &[]), 0.0);
    }

    #[test]
    fn decodes_token_matrices() {
        let encoded: EncodeResponse = serde_json::from_str(
            r#"{"query": [[1.0, 0.0]], "documents": [[[1.0, 0.0]], [[0.0, 1.0], [0.5, 0.5]]]}"#,
        )
        .unwrap();
        let scores: Vec<f32> = encoded
            .documents
            .iter()
            .map(|doc| maxsim(&encoded.query, doc))
            .collect();
        assert_eq!(scores, vec![1.0, 0.5]);
    }
}
