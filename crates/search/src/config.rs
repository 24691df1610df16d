use crate::error::{Result, SearchError};
use crate::fusion::DEFAULT_RRF_K;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Retrieval pipeline settings.
///
/// Loaded from JSON or TOML. Every field is optional in the file and falls
/// back to the default below; unknown keys are rejected.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// RRF smoothing constant.
    pub rrf_k: f64,
    pub lexical_weight: f64,
    pub vector_weight: f64,
    /// Candidates requested from the lexical index.
    pub lexical_top_n: usize,
    /// Candidates requested from vector search.
    pub vector_top_n: usize,
    /// Fused candidates handed to the reranker.
    pub fused_top_n: usize,
    /// Examples returned to the caller.
    pub top_k: usize,
    pub vector_collection: String,
    pub vector_timeout_ms: u64,
    /// Proceed with the lexical list alone when vector search fails.
    pub allow_lexical_only: bool,
    pub rerank: RerankerConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerankerConfig {
    /// `cross-encoder`, `late-interaction`, `llm` or `lexical`.
    pub backend: String,
    pub model: Option<String>,
    pub endpoint: Option<String>,
    /// Environment variable holding the bearer token.
    pub api_key_env: Option<String>,
    pub max_input_chars: usize,
    pub timeout_ms: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            rrf_k: DEFAULT_RRF_K,
            lexical_weight: 1.0,
            vector_weight: 1.0,
            lexical_top_n: 20,
            vector_top_n: 20,
            fused_top_n: 10,
            top_k: 3,
            vector_collection: "refactoring_examples".to_string(),
            vector_timeout_ms: 10_000,
            allow_lexical_only: false,
            rerank: RerankerConfig::default(),
        }
    }
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            backend: "cross-encoder".to_string(),
            model: None,
            endpoint: None,
            api_key_env: None,
            max_input_chars: 8192,
            timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    rrf_k: Option<f64>,
    lexical_weight: Option<f64>,
    vector_weight: Option<f64>,
    lexical_top_n: Option<usize>,
    vector_top_n: Option<usize>,
    fused_top_n: Option<usize>,
    top_k: Option<usize>,
    vector_collection: Option<String>,
    vector_timeout_ms: Option<u64>,
    allow_lexical_only: Option<bool>,
    rerank: Option<RawRerankerConfig>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRerankerConfig {
    backend: Option<String>,
    model: Option<String>,
    endpoint: Option<String>,
    api_key_env: Option<String>,
    max_input_chars: Option<usize>,
    timeout_ms: Option<u64>,
}

const TOP_LEVEL_KEYS: &[&str] = &[
    "rrf_k",
    "lexical_weight",
    "vector_weight",
    "lexical_top_n",
    "vector_top_n",
    "fused_top_n",
    "top_k",
    "vector_collection",
    "vector_timeout_ms",
    "allow_lexical_only",
    "rerank",
];

const RERANK_KEYS: &[&str] = &[
    "backend",
    "model",
    "endpoint",
    "api_key_env",
    "max_input_chars",
    "timeout_ms",
];

impl RetrievalConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|err| {
            SearchError::Config(format!("Failed to read config file {}: {err}", path.display()))
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = parse_raw(bytes)?;
        let config = Self::from_raw(raw);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawConfig) -> Self {
        let defaults = Self::default();
        Self {
            rrf_k: raw.rrf_k.unwrap_or(defaults.rrf_k),
            lexical_weight: raw.lexical_weight.unwrap_or(defaults.lexical_weight),
            vector_weight: raw.vector_weight.unwrap_or(defaults.vector_weight),
            lexical_top_n: raw.lexical_top_n.unwrap_or(defaults.lexical_top_n),
            vector_top_n: raw.vector_top_n.unwrap_or(defaults.vector_top_n),
            fused_top_n: raw.fused_top_n.unwrap_or(defaults.fused_top_n),
            top_k: raw.top_k.unwrap_or(defaults.top_k),
            vector_collection: raw
                .vector_collection
                .unwrap_or(defaults.vector_collection),
            vector_timeout_ms: raw.vector_timeout_ms.unwrap_or(defaults.vector_timeout_ms),
            allow_lexical_only: raw
                .allow_lexical_only
                .unwrap_or(defaults.allow_lexical_only),
            rerank: RerankerConfig::from_raw(raw.rerank),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !self.rrf_k.is_finite() || self.rrf_k <= 0.0 {
            problems.push("rrf_k must be a positive number".to_string());
        }
        for (name, weight) in [
            ("lexical_weight", self.lexical_weight),
            ("vector_weight", self.vector_weight),
        ] {
            if !weight.is_finite() || weight <= 0.0 {
                problems.push(format!("{name} must be a positive number"));
            }
        }
        for (name, value) in [
            ("lexical_top_n", self.lexical_top_n),
            ("vector_top_n", self.vector_top_n),
            ("fused_top_n", self.fused_top_n),
            ("top_k", self.top_k),
            ("rerank.max_input_chars", self.rerank.max_input_chars),
        ] {
            if value == 0 {
                problems.push(format!("{name} must be positive"));
            }
        }
        if self.vector_timeout_ms == 0 {
            problems.push("vector_timeout_ms must be positive".to_string());
        }
        if self.rerank.timeout_ms == 0 {
            problems.push("rerank.timeout_ms must be positive".to_string());
        }
        if self.vector_collection.trim().is_empty() {
            problems.push("vector_collection must not be empty".to_string());
        }
        if self.rerank.backend.trim().is_empty() {
            problems.push("rerank.backend must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SearchError::Config(problems.join("; ")))
        }
    }

    #[must_use]
    pub const fn vector_timeout(&self) -> Duration {
        Duration::from_millis(self.vector_timeout_ms)
    }
}

impl RerankerConfig {
    /// Settings for the in-process lexical backend.
    #[must_use]
    pub fn lexical() -> Self {
        Self {
            backend: "lexical".to_string(),
            ..Self::default()
        }
    }

    fn from_raw(raw: Option<RawRerankerConfig>) -> Self {
        let raw = raw.unwrap_or_default();
        let defaults = Self::default();
        Self {
            backend: raw.backend.unwrap_or(defaults.backend),
            model: raw.model,
            endpoint: raw.endpoint,
            api_key_env: raw.api_key_env,
            max_input_chars: raw.max_input_chars.unwrap_or(defaults.max_input_chars),
            timeout_ms: raw.timeout_ms.unwrap_or(defaults.timeout_ms),
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn parse_raw(bytes: &[u8]) -> Result<RawConfig> {
    let value: serde_json::Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(json_err) => {
            let utf8 = std::str::from_utf8(bytes)
                .map_err(|err| SearchError::Config(format!("{json_err}; {err}")))?;
            let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                SearchError::Config(format!(
                    "Config is not valid JSON or TOML ({json_err}); TOML parse error: {toml_err}"
                ))
            })?;
            serde_json::to_value(toml_value).map_err(|err| {
                SearchError::Config(format!("Failed to convert TOML config to JSON: {err}"))
            })?
        }
    };

    validate_config_value(&value)?;
    serde_json::from_value(value).map_err(|err| SearchError::Config(format!("Config parse error: {err}")))
}

fn validate_config_value(value: &serde_json::Value) -> Result<()> {
    fn collect_unknown(
        unknown: &mut Vec<String>,
        obj: &serde_json::Map<String, serde_json::Value>,
        base: &str,
        allowed: &[&str],
    ) {
        for key in obj.keys() {
            if allowed.contains(&key.as_str()) {
                continue;
            }
            if base.is_empty() {
                unknown.push(key.clone());
            } else {
                unknown.push(format!("{base}.{key}"));
            }
        }
    }

    let serde_json::Value::Object(root) = value else {
        return Err(SearchError::Config("Config must be an object".to_string()));
    };

    let mut unknown = Vec::new();
    collect_unknown(&mut unknown, root, "", TOP_LEVEL_KEYS);
    if let Some(serde_json::Value::Object(rerank)) = root.get("rerank") {
        collect_unknown(&mut unknown, rerank, "rerank", RERANK_KEYS);
    }

    if unknown.is_empty() {
        Ok(())
    } else {
        Err(SearchError::Config(format!(
            "Config has unknown fields: {}",
            unknown.join(", ")
        )))
    }
}
