//! Hybrid rank fusion of vector and keyword results
//!
//! 1. Index both lists by `(kind, id)`.
//! 2. Vector hits seed `vector_score`; keyword hits fill `keyword_score`,
//!    inserting items the vector backend missed.
//! 3. `combined = α × vector + (1 - α) × keyword`; entries left with no
//!    weighted signal (combined ≤ 0) are dropped.
//! 4. Sort by combined (desc), vector (desc), id (asc), kind (asc).
//! 5. Truncate to `k`.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::item::{ItemKey, ScoredResult};
use crate::domain::search::SearchHit;
use crate::domain::DomainError;

/// Blending configuration for the hybrid combiner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridConfig {
    /// Weight of the vector score, in [0, 1]
    alpha: f32,
}

impl HybridConfig {
    /// Creates a config, rejecting α outside [0, 1]
    pub fn new(alpha: f32) -> Result<Self, DomainError> {
        if !(0.0..=1.0).contains(&alpha) || alpha.is_nan() {
            return Err(DomainError::validation(format!(
                "hybrid alpha must be within [0, 1], got {}",
                alpha
            )));
        }

        Ok(Self { alpha })
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self { alpha: 0.7 }
    }
}

/// Fuses the ranked outputs of vector and keyword search
#[derive(Debug, Clone, Default)]
pub struct HybridCombiner {
    config: HybridConfig,
}

impl HybridCombiner {
    pub fn new(config: HybridConfig) -> Self {
        Self { config }
    }

    pub fn alpha(&self) -> f32 {
        self.config.alpha
    }

    /// Merges both lists into at most `k` results
    ///
    /// Either list may be empty; both empty yields an empty result.
    pub fn combine(
        &self,
        vector: Vec<SearchHit>,
        keyword: Vec<SearchHit>,
        k: usize,
    ) -> Vec<ScoredResult> {
        let alpha = self.config.alpha;
        let mut merged: HashMap<ItemKey, ScoredResult> =
            HashMap::with_capacity(vector.len() + keyword.len());

        for hit in vector {
            let key = hit.item.key();
            merged
                .entry(key)
                .and_modify(|existing| {
                    existing.vector_score = existing.vector_score.max(hit.score);
                })
                .or_insert(ScoredResult {
                    item: hit.item,
                    vector_score: hit.score,
                    keyword_score: 0.0,
                    combined_score: 0.0,
                });
        }

        for hit in keyword {
            let key = hit.item.key();
            match merged.get_mut(&key) {
                Some(existing) => {
                    existing.keyword_score = existing.keyword_score.max(hit.score);
                }
                None => {
                    merged.insert(
                        key,
                        ScoredResult {
                            item: hit.item,
                            vector_score: 0.0,
                            keyword_score: hit.score,
                            combined_score: 0.0,
                        },
                    );
                }
            }
        }

        let mut results: Vec<ScoredResult> = merged
            .into_values()
            .map(|mut result| {
                result.combined_score =
                    alpha * result.vector_score + (1.0 - alpha) * result.keyword_score;
                result
            })
            .filter(|result| result.combined_score > 0.0)
            .collect();

        results.sort_by(compare_results);
        results.truncate(k);
        results
    }
}

fn compare_results(a: &ScoredResult, b: &ScoredResult) -> Ordering {
    b.combined_score
        .partial_cmp(&a.combined_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.vector_score
                .partial_cmp(&a.vector_score)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.item.id().cmp(b.item.id()))
        .then_with(|| a.item.kind().cmp(&b.item.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::item::{Document, ItemKind, StructuredRecord};

    fn doc_hit(id: &str, score: f32) -> SearchHit {
        SearchHit::new(Document::new(id, "t1", "faq", format!("content {}", id)), score)
    }

    fn record_hit(id: &str, score: f32) -> SearchHit {
        SearchHit::new(StructuredRecord::new(id, "t1", "property", id), score)
    }

    fn ids(results: &[ScoredResult]) -> Vec<&str> {
        results.iter().map(|r| r.item.id()).collect()
    }

    #[test]
    fn test_alpha_out_of_range_rejected() {
        assert!(HybridConfig::new(1.5).is_err());
        assert!(HybridConfig::new(-0.1).is_err());
        assert!(HybridConfig::new(f32::NAN).is_err());
        assert!(HybridConfig::new(0.0).is_ok());
        assert!(HybridConfig::new(1.0).is_ok());
    }

    #[test]
    fn test_both_empty_yields_empty() {
        let combiner = HybridCombiner::default();
        assert!(combiner.combine(vec![], vec![], 5).is_empty());
    }

    #[test]
    fn test_alpha_one_matches_vector_order() {
        let combiner = HybridCombiner::new(HybridConfig::new(1.0).unwrap());
        let vector = vec![doc_hit("c", 0.9), doc_hit("a", 0.7), doc_hit("b", 0.4)];
        let keyword = vec![doc_hit("b", 0.99), doc_hit("x", 0.95), doc_hit("a", 0.1)];

        let results = combiner.combine(vector, keyword, 3);
        assert_eq!(ids(&results), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_alpha_zero_matches_keyword_order() {
        let combiner = HybridCombiner::new(HybridConfig::new(0.0).unwrap());
        let vector = vec![doc_hit("a", 0.99), doc_hit("y", 0.98)];
        let keyword = vec![doc_hit("b", 0.8), doc_hit("a", 0.5), doc_hit("c", 0.2)];

        let results = combiner.combine(vector, keyword, 3);
        assert_eq!(ids(&results), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_alpha_one_drops_keyword_only_items() {
        let combiner = HybridCombiner::new(HybridConfig::new(1.0).unwrap());

        let results = combiner.combine(vec![doc_hit("a", 0.9)], vec![doc_hit("b", 0.5)], 5);

        assert_eq!(ids(&results), vec!["a"]);
        assert!((results[0].combined_score - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_zero_drops_vector_only_items() {
        let combiner = HybridCombiner::new(HybridConfig::new(0.0).unwrap());

        let results = combiner.combine(vec![doc_hit("a", 0.9)], vec![doc_hit("b", 0.5)], 5);

        assert_eq!(ids(&results), vec!["b"]);
        assert!((results[0].combined_score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_alpha_one_tie_across_kinds_follows_hit_order() {
        let combiner = HybridCombiner::new(HybridConfig::new(1.0).unwrap());
        let mut vector = vec![doc_hit("b", 0.5), record_hit("a", 0.5), record_hit("b", 0.5)];
        vector.sort_by(SearchHit::rank_order);
        let expected: Vec<ItemKey> = vector.iter().map(|h| h.item.key()).collect();

        let results = combiner.combine(vector, vec![], 5);
        let keys: Vec<ItemKey> = results.iter().map(|r| r.key()).collect();

        assert_eq!(keys, expected);
        assert_eq!(keys[0].id, "a");
        assert_eq!(keys[1].kind, ItemKind::Document);
    }

    #[test]
    fn test_disjoint_lists_union_without_duplicates() {
        let combiner = HybridCombiner::new(HybridConfig::new(0.5).unwrap());
        let vector = vec![doc_hit("v1", 0.9), doc_hit("v2", 0.8)];
        let keyword = vec![doc_hit("k1", 0.7), doc_hit("k2", 0.6), doc_hit("k3", 0.5)];

        let all = combiner.combine(vector.clone(), keyword.clone(), 10);
        assert_eq!(all.len(), 5);

        let mut unique: Vec<_> = all.iter().map(|r| r.key()).collect();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), 5);

        let truncated = combiner.combine(vector, keyword, 3);
        assert_eq!(truncated.len(), 3);
    }

    #[test]
    fn test_overlapping_item_gets_both_scores() {
        let combiner = HybridCombiner::new(HybridConfig::new(0.6).unwrap());
        let results = combiner.combine(
            vec![doc_hit("a", 0.5), doc_hit("b", 0.9)],
            vec![doc_hit("a", 1.0)],
            5,
        );

        let a = results.iter().find(|r| r.item.id() == "a").unwrap();
        assert!((a.vector_score - 0.5).abs() < 1e-6);
        assert!((a.keyword_score - 1.0).abs() < 1e-6);
        assert!((a.combined_score - (0.6 * 0.5 + 0.4 * 1.0)).abs() < 1e-6);

        let b = results.iter().find(|r| r.item.id() == "b").unwrap();
        assert_eq!(b.keyword_score, 0.0);
        assert!((b.combined_score - 0.54).abs() < 1e-6);

        assert_eq!(ids(&results), vec!["a", "b"]);
    }

    #[test]
    fn test_same_id_different_kind_kept_apart() {
        let combiner = HybridCombiner::default();
        let results = combiner.combine(
            vec![doc_hit("villa", 0.8)],
            vec![record_hit("villa", 0.8)],
            5,
        );

        assert_eq!(results.len(), 2);
        let kinds: Vec<ItemKind> = results.iter().map(|r| r.item.kind()).collect();
        assert!(kinds.contains(&ItemKind::Document));
        assert!(kinds.contains(&ItemKind::StructuredRecord));
    }

    #[test]
    fn test_ties_broken_by_vector_then_id() {
        let combiner = HybridCombiner::new(HybridConfig::new(0.5).unwrap());
        // combined: p = 0.5*0.6 + 0.5*0.2 = 0.4, q = 0.5*0.2 + 0.5*0.6 = 0.4
        let vector = vec![doc_hit("q", 0.2), doc_hit("p", 0.6)];
        let keyword = vec![doc_hit("q", 0.6), doc_hit("p", 0.2)];

        let results = combiner.combine(vector, keyword, 5);
        assert_eq!(ids(&results), vec!["p", "q"]);

        // Identical scores everywhere: id ascending
        let results = combiner.combine(
            vec![doc_hit("zeta", 0.5), doc_hit("alpha", 0.5)],
            vec![],
            5,
        );
        assert_eq!(ids(&results), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let combiner = HybridCombiner::default();
        let vector = vec![doc_hit("a", 0.3), doc_hit("b", 0.3), doc_hit("c", 0.3)];
        let keyword = vec![doc_hit("c", 0.3), doc_hit("d", 0.3)];

        let first = combiner.combine(vector.clone(), keyword.clone(), 4);
        for _ in 0..10 {
            assert_eq!(combiner.combine(vector.clone(), keyword.clone(), 4), first);
        }
    }
}
