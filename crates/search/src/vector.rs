use async_trait::async_trait;

/// External nearest-neighbour search over the same document strings the
/// lexical index holds.
///
/// Implementations return documents best first. Their text must match the
/// lexical corpus exactly, or fusion treats them as different documents.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(&self, query: &str, n: usize, collection: &str) -> anyhow::Result<Vec<String>>;
}
