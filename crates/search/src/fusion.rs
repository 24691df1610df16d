use crate::error::{Result, SearchError};
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_RRF_K: f64 = 60.0;

/// Reciprocal Rank Fusion over ranked lists of document strings.
///
/// score(d) = Σ weight_i / (k + rank_i(d) + 1), rank zero-based.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReciprocalRankFusion {
    k: f64,
}

impl ReciprocalRankFusion {
    pub fn new(k: f64) -> Result<Self> {
        if !k.is_finite() || k <= 0.0 {
            return Err(SearchError::Fusion("k must be positive"));
        }
        Ok(Self { k })
    }

    #[must_use]
    pub const fn k(&self) -> f64 {
        self.k
    }

    /// Fuse lists with equal weight.
    pub fn fuse<S: AsRef<str>>(&self, lists: &[Vec<S>]) -> FusionScores {
        let mut scores = FusionScores::default();
        for list in lists {
            self.accumulate(&mut scores, 1.0, list);
        }
        scores
    }

    /// Fuse lists, scaling each list's contributions by its weight.
    pub fn fuse_weighted<S: AsRef<str>>(&self, lists: &[(f64, Vec<S>)]) -> FusionScores {
        let mut scores = FusionScores::default();
        for (weight, list) in lists {
            self.accumulate(&mut scores, *weight, list);
        }
        scores
    }

    fn accumulate<S: AsRef<str>>(&self, scores: &mut FusionScores, weight: f64, list: &[S]) {
        let mut seen: HashSet<&str> = HashSet::with_capacity(list.len());
        for (rank, doc) in list.iter().enumerate() {
            let doc = doc.as_ref();
            // a repeated entry keeps only its best rank
            if !seen.insert(doc) {
                continue;
            }
            scores.add(doc, weight / (self.k + rank as f64 + 1.0));
        }
    }
}

impl Default for ReciprocalRankFusion {
    fn default() -> Self {
        Self { k: DEFAULT_RRF_K }
    }
}

/// Accumulated fusion score per document, in first-seen order.
///
/// Scores are summed smallest contribution first, so they are bit-identical
/// whatever order the lists were fused in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FusionScores {
    entries: Vec<(String, f64)>,
    contributions: Vec<Vec<f64>>,
    positions: HashMap<String, usize>,
}

impl FusionScores {
    fn add(&mut self, doc: &str, contribution: f64) {
        let pos = match self.positions.entry(doc.to_string()) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => {
                slot.insert(self.entries.len());
                self.entries.push((doc.to_string(), 0.0));
                self.contributions.push(Vec::new());
                self.entries.len() - 1
            }
        };
        let parts = &mut self.contributions[pos];
        parts.push(contribution);
        parts.sort_by(f64::total_cmp);
        self.entries[pos].1 = parts.iter().sum();
    }

    #[must_use]
    pub fn get(&self, doc: &str) -> Option<f64> {
        self.positions.get(doc).map(|&pos| self.entries[pos].1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(document, score)` pairs in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(doc, score)| (doc.as_str(), *score))
    }

    /// The `n` best documents, highest score first; ties keep first-seen order.
    pub fn top_n(&self, n: usize) -> Result<Vec<(String, f64)>> {
        if n == 0 {
            return Err(SearchError::Fusion("n must be positive"));
        }
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(n);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn consensus_ranking_from_two_lists() {
        let fusion = ReciprocalRankFusion::default();
        let scores = fusion.fuse(&[vec!["d1", "d2", "d3"], vec!["d2", "d3", "d1"]]);

        assert!(close(scores.get("d1").unwrap(), 1.0 / 61.0 + 1.0 / 63.0));
        assert!(close(scores.get("d2").unwrap(), 1.0 / 62.0 + 1.0 / 61.0));
        assert!(close(scores.get("d3").unwrap(), 1.0 / 63.0 + 1.0 / 62.0));

        let top: Vec<_> = scores.top_n(3).unwrap().into_iter().map(|(d, _)| d).collect();
        assert_eq!(top, vec!["d2", "d1", "d3"]);
    }

    #[test]
    fn single_list_documents_still_score() {
        let scores = ReciprocalRankFusion::default().fuse(&[vec!["a", "b"], vec!["c"]]);
        assert_eq!(scores.len(), 3);
        assert!(close(scores.get("c").unwrap(), 1.0 / 61.0));
        assert_eq!(scores.get("missing"), None);
    }

    #[test]
    fn ties_break_by_first_seen() {
        let scores = ReciprocalRankFusion::default().fuse(&[vec!["x"], vec!["y"]]);
        let top = scores.top_n(2).unwrap();
        assert_eq!(top[0].0, "x");
        assert_eq!(top[1].0, "y");
    }

    #[test]
    fn duplicate_within_a_list_counts_once() {
        let scores = ReciprocalRankFusion::default().fuse(&[vec!["a", "a", "b"]]);
        assert!(close(scores.get("a").unwrap(), 1.0 / 61.0));
        assert!(close(scores.get("b").unwrap(), 1.0 / 63.0));
    }

    #[test]
    fn weights_scale_contributions() {
        let fusion = ReciprocalRankFusion::new(10.0).unwrap();
        let scores = fusion.fuse_weighted(&[(2.0, vec!["a"]), (0.5, vec!["b", "a"])]);
        assert!(close(scores.get("a").unwrap(), 2.0 / 11.0 + 0.5 / 12.0));
        assert!(close(scores.get("b").unwrap(), 0.5 / 11.0));
    }

    #[test]
    fn three_list_scores_do_not_depend_on_list_order() {
        let fusion = ReciprocalRankFusion::default();
        let a = vec!["x", "y"];
        let b = vec!["x"];
        let c = vec!["y", "x"];

        let abc = fusion.fuse(&[a.clone(), b.clone(), c.clone()]);
        let cba = fusion.fuse(&[c, b, a]);
        assert_eq!(abc.get("x"), cba.get("x"));
        assert_eq!(abc.get("x").map(f64::to_bits), cba.get("x").map(f64::to_bits));
    }

    #[test]
    fn rejects_non_positive_arguments() {
        assert!(matches!(
            ReciprocalRankFusion::new(0.0),
            Err(SearchError::Fusion(_))
        ));
        assert!(ReciprocalRankFusion::new(-1.0).is_err());
        assert!(matches!(
            FusionScores::default().top_n(0),
            Err(SearchError::Fusion(_))
        ));
    }

    #[test]
    fn empty_input_is_empty() {
        let scores = ReciprocalRankFusion::default().fuse::<String>(&[]);
        assert!(scores.is_empty());
        assert!(scores.top_n(5).unwrap().is_empty());
    }
}
