use crate::error::{RepositoryError, Result};
use crate::record::RefactoringRecord;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const REPOSITORY_SCHEMA_VERSION: u32 = 1;

/// What to do when a key is inserted twice during a build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The later record replaces the earlier one.
    #[default]
    Overwrite,
    /// The earlier record is kept; later ones are dropped.
    KeepFirst,
    /// The build fails with [`RepositoryError::DuplicateKey`].
    Reject,
}

/// Exact-match lookup from a document string back to its source record.
///
/// Keys are the very strings handed to the lexical index and the vector
/// store, so every retrieval hit can be resolved without fuzzy matching.
#[derive(Clone, Debug)]
pub struct DocumentRepository<R = RefactoringRecord> {
    entries: BTreeMap<String, R>,
    duplicates: usize,
}

#[derive(Serialize)]
struct PersistedRepositoryRef<'a, R> {
    schema_version: u32,
    duplicates: usize,
    entries: &'a BTreeMap<String, R>,
}

#[derive(Deserialize)]
struct PersistedRepository<R> {
    schema_version: u32,
    #[serde(default)]
    duplicates: usize,
    entries: BTreeMap<String, R>,
}

impl<R> Default for DocumentRepository<R> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            duplicates: 0,
        }
    }
}

impl<R> DocumentRepository<R> {
    /// Build from `(key, record)` pairs; the last write for a key wins.
    pub fn build<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
    {
        let mut repository = Self::default();
        for (key, record) in pairs {
            let key = key.into();
            if repository.entries.insert(key.clone(), record).is_some() {
                repository.note_duplicate(&key, DuplicatePolicy::Overwrite);
            }
        }
        repository
    }

    pub fn build_with_policy<I, K>(pairs: I, policy: DuplicatePolicy) -> Result<Self>
    where
        I: IntoIterator<Item = (K, R)>,
        K: Into<String>,
    {
        if policy == DuplicatePolicy::Overwrite {
            return Ok(Self::build(pairs));
        }

        let mut repository = Self::default();
        for (key, record) in pairs {
            let key = key.into();
            if repository.entries.contains_key(&key) {
                if policy == DuplicatePolicy::Reject {
                    return Err(RepositoryError::DuplicateKey(key));
                }
                repository.note_duplicate(&key, policy);
                continue;
            }
            repository.entries.insert(key, record);
        }
        Ok(repository)
    }

    fn note_duplicate(&mut self, key: &str, policy: DuplicatePolicy) {
        self.duplicates += 1;
        let preview: String = key.chars().take(60).collect();
        log::warn!("Duplicate repository key ({policy:?}): {preview:?}");
    }

    #[must_use]
    pub fn find(&self, key: &str) -> Option<&R> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many inserts collided with an existing key during the build.
    #[must_use]
    pub const fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &R)> {
        self.entries.iter().map(|(key, record)| (key.as_str(), record))
    }
}

impl<R: Serialize + DeserializeOwned> DocumentRepository<R> {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let persisted = PersistedRepositoryRef {
            schema_version: REPOSITORY_SCHEMA_VERSION,
            duplicates: self.duplicates,
            entries: &self.entries,
        };
        Ok(serde_json::to_vec_pretty(&persisted)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let persisted: PersistedRepository<R> = serde_json::from_slice(bytes)?;
        if persisted.schema_version != REPOSITORY_SCHEMA_VERSION {
            return Err(RepositoryError::UnsupportedSchema {
                found: persisted.schema_version,
                expected: REPOSITORY_SCHEMA_VERSION,
            });
        }
        Ok(Self {
            entries: persisted.entries,
            duplicates: persisted.duplicates,
        })
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        log::info!("Saving repository ({} records) to {:?}", self.len(), path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = self.to_bytes()?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        log::info!("Loading repository from {:?}", path.as_ref());
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn last_write_wins() {
        let repository = DocumentRepository::build([("k1", json!({"id": 1})), ("k1", json!({"id": 2}))]);

        assert_eq!(repository.find("k1"), Some(&json!({"id": 2})));
        assert_eq!(repository.len(), 1);
        assert_eq!(repository.duplicates(), 1);
    }

    #[test]
    fn missing_key_is_none() {
        let repository = DocumentRepository::build([("k1", json!({"id": 1}))]);
        assert_eq!(repository.find("missing"), None);
        assert!(!repository.contains("missing"));
        assert!(repository.contains("k1"));
    }

    #[test]
    fn rebuilding_from_the_same_pairs_is_idempotent() {
        let pairs = vec![("b", json!(2)), ("a", json!(1)), ("b", json!(3))];
        let first = DocumentRepository::build(pairs.clone());
        let second = DocumentRepository::build(pairs);

        assert_eq!(first.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            first.iter().collect::<Vec<_>>(),
            second.iter().collect::<Vec<_>>()
        );
    }

    #[test]
    fn keep_first_and_reject_policies() {
        let pairs = || vec![("k", json!("first")), ("k", json!("second"))];

        let kept = DocumentRepository::build_with_policy(pairs(), DuplicatePolicy::KeepFirst).unwrap();
        assert_eq!(kept.find("k"), Some(&json!("first")));
        assert_eq!(kept.duplicates(), 1);

        let rejected = DocumentRepository::<Value>::build_with_policy(pairs(), DuplicatePolicy::Reject);
        assert!(matches!(rejected, Err(RepositoryError::DuplicateKey(key)) if key == "k"));
    }

    #[test]
    fn empty_repository() {
        let repository = DocumentRepository::<Value>::build(Vec::<(String, Value)>::new());
        assert!(repository.is_empty());
        assert_eq!(repository.find(""), None);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("store").join("repository.json");

        let record = RefactoringRecord {
            refactoring_type: Some("Extract Method".to_string()),
            source_code_before: Some("void a() {}".to_string()),
            unique_id: Some("u-1".to_string()),
            is_pure_refactoring: true,
            ..RefactoringRecord::default()
        };
        let repository = DocumentRepository::build([
            ("doc one", record.clone()),
            ("doc two", RefactoringRecord::default()),
            ("doc one", record.clone()),
        ]);
        repository.save(&path).await.unwrap();

        let loaded: DocumentRepository = DocumentRepository::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.duplicates(), 1);
        assert_eq!(loaded.find("doc one"), Some(&record));
        assert_eq!(loaded.find("doc two"), Some(&RefactoringRecord::default()));
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let bytes = br#"{"schema_version": 7, "entries": {}}"#;
        assert!(matches!(
            DocumentRepository::<Value>::from_bytes(bytes),
            Err(RepositoryError::UnsupportedSchema { found: 7, .. })
        ));
    }
}
