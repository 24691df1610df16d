//! Ingestion of mined refactorings into `(document, record)` pairs.
//!
//! The input is the JSON emitted by the refactoring miner:
//! `{"commits": [{"refactorings": [ ... ]}, ...]}`. Each accepted record
//! becomes one document string, and the same string is used as the lexical
//! corpus entry, the vector-store document and the repository key.

use crate::comments::strip_java_comments;
use crate::error::{RepositoryError, Result};
use crate::record::RefactoringRecord;
use crate::repository::DocumentRepository;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestOptions {
    /// Prefix each document with the record's `contextDescription`.
    pub with_context: bool,
    /// Accept only records flagged `isPureRefactoring`.
    pub pure_only: bool,
    /// Stop after this many accepted records.
    pub limit: Option<usize>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            with_context: true,
            pure_only: true,
            limit: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub entries: usize,
    pub skipped_duplicate_ids: usize,
    pub skipped_impure: usize,
    pub skipped_missing_context: usize,
    pub skipped_missing_source: usize,
}

/// Accepted pairs plus the bookkeeping of what was dropped.
#[derive(Clone, Debug, Default)]
pub struct Ingestion {
    pub entries: Vec<(String, RefactoringRecord)>,
    pub report: IngestReport,
}

impl Ingestion {
    /// Document strings in ingestion order.
    #[must_use]
    pub fn documents(&self) -> Vec<String> {
        self.entries.iter().map(|(key, _)| key.clone()).collect()
    }

    #[must_use]
    pub fn into_repository(self) -> DocumentRepository {
        DocumentRepository::build(self.entries)
    }
}

#[derive(Deserialize)]
struct RawCorpus {
    commits: Option<Vec<RawCommit>>,
}

#[derive(Deserialize)]
struct RawCommit {
    #[serde(default)]
    refactorings: Vec<RefactoringRecord>,
}

#[derive(Clone, Debug, Default)]
pub struct RefactoringCorpus {
    commits: Vec<Vec<RefactoringRecord>>,
}

impl RefactoringCorpus {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: RawCorpus = serde_json::from_slice(bytes)?;
        let commits = raw
            .commits
            .ok_or_else(|| RepositoryError::MalformedCorpus("missing \"commits\" array".to_string()))?;
        Ok(Self {
            commits: commits.into_iter().map(|commit| commit.refactorings).collect(),
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        log::info!("Reading refactoring corpus from {:?}", path.as_ref());
        let bytes = tokio::fs::read(path).await?;
        Self::from_bytes(&bytes)
    }

    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.len()
    }

    #[must_use]
    pub fn refactoring_count(&self) -> usize {
        self.commits.iter().map(Vec::len).sum()
    }

    /// Walk commits in order and keep the records `options` accept.
    ///
    /// A `uniqueId` is accepted once; records without one are never treated
    /// as duplicates.
    #[must_use]
    pub fn entries(&self, options: &IngestOptions) -> Ingestion {
        let mut ingestion = Ingestion::default();
        let mut seen_ids: HashSet<&str> = HashSet::new();
        let limit = options.limit.unwrap_or(usize::MAX);

        'commits: for refactorings in &self.commits {
            for record in refactorings {
                if ingestion.entries.len() >= limit {
                    break 'commits;
                }
                let report = &mut ingestion.report;

                if let Some(id) = record.unique_id.as_deref() {
                    if seen_ids.contains(id) {
                        log::info!("Skipping duplicate uniqueId: {id}");
                        report.skipped_duplicate_ids += 1;
                        continue;
                    }
                }
                if options.pure_only && !record.is_pure_refactoring {
                    report.skipped_impure += 1;
                    continue;
                }
                if record.source_code_before.is_none() {
                    report.skipped_missing_source += 1;
                    continue;
                }
                let Some(key) = document_key(record, options.with_context) else {
                    report.skipped_missing_context += 1;
                    continue;
                };

                if let Some(id) = record.unique_id.as_deref() {
                    seen_ids.insert(id);
                }
                ingestion.entries.push((key, record.clone()));
                report.entries += 1;
            }
        }

        log::debug!("Ingestion report: {:?}", ingestion.report);
        ingestion
    }
}

/// Document string for `record`: the context description and the
/// comment-free source before the refactoring, joined by a newline.
///
/// Returns `None` when a required field is absent.
#[must_use]
pub fn document_key(record: &RefactoringRecord, with_context: bool) -> Option<String> {
    let source = strip_java_comments(record.source_code_before.as_deref()?);
    if !with_context {
        return Some(source);
    }
    let context = record.context_description.as_deref()?;
    Some(format!("{context}\n{source}"))
}
