use crate::error::Result;
use crate::index::Bm25Index;
use std::sync::{Arc, PoisonError, RwLock};

/// Copy-on-write handle for sharing one index between readers and a writer.
///
/// Readers take an immutable snapshot and search it without holding the lock.
/// Writers rebuild a private copy and swap it in, so a reader observes either
/// the previous version or the new one, never a partial rebuild. Concurrent
/// writers are serialized by the write lock around the swap.
#[derive(Clone, Debug)]
pub struct SharedIndex {
    current: Arc<RwLock<Arc<Bm25Index>>>,
}

impl SharedIndex {
    pub fn new(index: Bm25Index) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Bm25Index> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn search(&self, query: &str, top_n: usize) -> Result<Vec<String>> {
        self.snapshot().search(query, top_n)
    }

    /// Add a batch and publish the rebuilt index. Returns the new version.
    pub fn add_documents<I, S>(&self, documents: I) -> u64
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Bm25Index::clone(&guard);
        next.add_documents(documents);
        let version = next.version();
        *guard = Arc::new(next);
        version
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }
}

impl From<Bm25Index> for SharedIndex {
    fn from(index: Bm25Index) -> Self {
        Self::new(index)
    }
}
