use super::{api_key_from_env, check_status, http_client, required, RerankBackend, RerankResult, Result};
use crate::config::RerankerConfig;
use crate::error::RerankError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const NAME: &str = "llm";

const SYSTEM_PROMPT: &str = "You judge how useful each candidate refactoring example is for \
refactoring the query code. Reply with JSON only: {\"scores\": [s0, s1, ...]}, one number \
between 0 and 1 per candidate, in candidate order.";

/// Listwise scoring by a hosted chat-completions model.
pub struct LlmBackend {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ScoreReply {
    scores: Vec<f32>,
}

impl LlmBackend {
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
impl RerankBackend for LlmBackend {
    fn name(&self) -> &str {
        NAME
    }

    async fn score_and_rank(&self, query: &str, candidates: &[String]) -> Result<RerankResult> {
        let prompt = build_prompt(query, candidates);
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };
        let mut builder = self.http.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = check_status(NAME, builder.send().await?).await?;
        let body: ChatResponse = resp.json().await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RerankError::backend(NAME, "empty completion"))?;
        let scores = parse_scores(&content, candidates.len())?;
        RerankResult::from_scores(candidates, &scores)
    }
}

fn build_prompt(query: &str, candidates: &[String]) -> String {
    let mut prompt = format!("Query code:\n{query}\n\nCandidates:\n");
    for (idx, candidate) in candidates.iter().enumerate() {
        let _ = write!(prompt, "\n[{idx}]\n{candidate}\n");
    }
    prompt
}

/// Pull `{"scores": [...]}` out of a completion, tolerating prose or code
/// fences around the object.
fn parse_scores(content: &str, expected: usize) -> Result<Vec<f32>> {
    let object = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => &content[start..=end],
        _ => return Err(RerankError::backend(NAME, "completion has no JSON object")),
    };
    let reply: ScoreReply = serde_json::from_str(object)
        .map_err(|err| RerankError::backend(NAME, format!("unparsable scores: {err}")))?;
    if reply.scores.len() != expected {
        return Err(RerankError::backend(
            NAME,
            format!("{} scores for {expected} candidates", reply.scores.len()),
        ));
    }
    Ok(reply.scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_fenced_json() {
        let content = "Here you go:\n```json\n{\"scores\": [0.2, 0.9]}\n```";
        assert_eq!(parse_scores(content, 2).unwrap(), vec![0.2, 0.9]);
    }

    #[test]
    fn count_mismatch_is_a_backend_error() {
        assert!(matches!(
            parse_scores("{\"scores\": [0.2]}", 2),
            Err(RerankError::Backend { .. })
        ));
    }

    #[test]
    fn prose_without_json_is_a_backend_error() {
        assert!(matches!(
            parse_scores("the second one", 2),
            Err(RerankError::Backend { .. })
        ));
    }

    #[test]
    fn prompt_numbers_candidates() {
        let prompt = build_prompt("void a() {}", &["x".to_string(), "y".to_string()]);
        assert!(prompt.contains("[0]\nx"));
        assert!(prompt.contains("[1]\ny"));
    }
}
