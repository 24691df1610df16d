use super::{api_key_from_env, check_status, http_client, required, RerankBackend, RerankResult, Result};
use crate::config::RerankerConfig;
use crate::error::RerankError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const NAME: &str = "cross-encoder";

/// Hosted pairwise scorer speaking the common `/rerank` protocol.
pub struct CrossEncoderBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
    return_documents: bool,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<ScoredIndex>,
}

#[derive(Deserialize)]
struct ScoredIndex {
    index: usize,
    relevance_score: f32,
}

impl CrossEncoderBackend {
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
impl RerankBackend for CrossEncoderBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn score_and_rank(&self, query: &str, candidates: &[String]) -> Result<RerankResult> {
        let request = RerankRequest {
            model: &self.model,
            query,
            documents: candidates,
            top_n: candidates.len(),
            return_documents: false,
        };
        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = check_status(NAME, builder.send().await?).await?;
        let body: RerankResponse = resp.json().await?;

        let scores = scores_by_index(body.results, candidates.len())?;
        RerankResult::from_scores(candidates, &scores)
    }
}

/// Scatter `(index, score)` pairs back into candidate order. Every candidate
/// must be scored exactly once.
fn scores_by_index(results: Vec<ScoredIndex>, count: usize) -> Result<Vec<f32>> {
    let mut scores: Vec<Option<f32>> = vec![None; count];
    for ScoredIndex {
        index,
        relevance_score,
    } in results
    {
        let Some(slot) = scores.get_mut(index) else {
            return Err(RerankError::backend(
                NAME,
                format!("index {index} out of range for {count} candidates"),
            ));
        };
        if slot.is_some() {
            return Err(RerankError::backend(NAME, format!("index {index} scored twice")));
        }
        *slot = Some(relevance_score);
    }
    scores
        .into_iter()
        .enumerate()
        .map(|(index, score)| {
            score.ok_or_else(|| RerankError::backend(NAME, format!("index {index} was not scored")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(body: &str) -> Vec<ScoredIndex> {
        serde_json::from_str::<RerankResponse>(body).unwrap().results
    }

    #[test]
    fn scatters_out_of_order_results() {
        let results = parse(
            r#"{"results": [
                {"index": 2, "relevance_score": 0.9},
                {"index": 0, "relevance_score": 0.4},
                {"index": 1, "relevance_score": 0.1}
            ]}"#,
        );
        assert_eq!(scores_by_index(results, 3).unwrap(), vec![0.4, 0.1, 0.9]);
    }

    #[test]
    fn rejects_partial_or_invalid_results() {
        let missing = parse(r#"{"results": [{"index": 0, "relevance_score": 0.4}]}"#);
        assert!(scores_by_index(missing, 2).is_err());

        let out_of_range = parse(r#"{"results": [{"index": 5, "relevance_score": 0.4}]}"#);
        assert!(scores_by_index(out_of_range, 1).is_err());

        let twice = parse(
            r#"{"results": [{"index": 0, "relevance_score": 0.4}, {"index": 0, "relevance_score": 0.5}]}"#,
        );
        assert!(matches!(
            scores_by_index(twice, 1),
            Err(RerankError::Backend { .. })
        ));
    }

    #[test]
    fn request_body_shape() {
        let docs = vec!["a".to_string(), "b".to_string()];
        let body = serde_json::to_value(RerankRequest {
            model: "rerank-v1",
            query: "q",
            documents: &docs,
            top_n: 2,
            return_documents: false,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "model": "rerank-v1",
                "query": "q",
                "documents": ["a", "b"],
                "top_n": 2,
                "return_documents": false
            })
        );
    }
}
