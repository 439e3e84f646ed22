//! Scoring front-ends over [`Parameters`], with an optional label-score cache.
//!
//! Decoders ask for the same `(feature, label)` weights over and over while
//! scoring the parts of one instance. [`CachedScorer`] memoizes those
//! lookups; [`DirectScorer`] reads the store every time. Both implement
//! [`Scorer`], so the choice is made once at construction time through
//! [`ScoringMode`].
//!
//! A cached value is only valid for the parameter snapshot it was read
//! from. The scorers hold a shared borrow of the store, so the store cannot
//! be mutated while a cache is alive; drop the scorer (or call
//! [`CachedScorer::invalidate`]) between updates.

use crate::feature::{FeatureId, Label};
use crate::parameters::Parameters;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A feature conjoined with one label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FeatureLabelPair {
    pub feature: FeatureId,
    pub label: Label,
}

/// Hit/miss/size counters, for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

/// Memoized `(feature, label) → weight` lookups.
#[derive(Clone, Debug, Default)]
pub struct FeatureLabelCache {
    entries: HashMap<FeatureLabelPair, f64>,
    hits: u64,
    misses: u64,
}

impl FeatureLabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, key: FeatureLabelPair) -> Option<f64> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: FeatureLabelPair, value: f64) {
        self.entries.insert(key, value);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
        }
    }

    /// Drop every entry and reset the counters.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

/// How label scores are computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMode {
    /// Read the store on every query.
    #[default]
    Direct,
    /// Memoize `(feature, label)` lookups for the scorer's lifetime.
    Cached,
}

/// The scoring interface decoders and trainers consume.
pub trait Scorer {
    /// Sum of the unlabeled weights of `features`.
    fn compute_score(&mut self, features: &[FeatureId]) -> f64;

    /// For each of `labels`, the sum of the labeled weights of `features`.
    fn compute_label_scores(&mut self, features: &[FeatureId], labels: &[Label]) -> Vec<f64>;

    /// Cache counters, if this scorer caches.
    fn cache_stats(&self) -> Option<CacheStats> {
        None
    }
}

/// Uncached scorer.
#[derive(Clone, Copy, Debug)]
pub struct DirectScorer<'a> {
    parameters: &'a Parameters,
}

impl<'a> DirectScorer<'a> {
    pub fn new(parameters: &'a Parameters) -> Self {
        Self { parameters }
    }
}

impl Scorer for DirectScorer<'_> {
    fn compute_score(&mut self, features: &[FeatureId]) -> f64 {
        self.parameters.compute_score(features)
    }

    fn compute_label_scores(&mut self, features: &[FeatureId], labels: &[Label]) -> Vec<f64> {
        self.parameters.compute_label_scores(features, labels)
    }
}

/// Scorer that memoizes labeled lookups within one parameter snapshot.
///
/// Not meant to be shared across threads; give each worker its own.
#[derive(Debug)]
pub struct CachedScorer<'a> {
    parameters: &'a Parameters,
    cache: FeatureLabelCache,
}

impl<'a> CachedScorer<'a> {
    pub fn new(parameters: &'a Parameters) -> Self {
        Self {
            parameters,
            cache: FeatureLabelCache::new(),
        }
    }

    pub fn cache(&self) -> &FeatureLabelCache {
        &self.cache
    }

    /// Forget every cached value.
    pub fn invalidate(&mut self) {
        self.cache.clear();
    }
}

impl Scorer for CachedScorer<'_> {
    fn compute_score(&mut self, features: &[FeatureId]) -> f64 {
        self.parameters.compute_score(features)
    }

    fn compute_label_scores(&mut self, features: &[FeatureId], labels: &[Label]) -> Vec<f64> {
        let mut scores = vec![0.0; labels.len()];
        let mut missing_labels = Vec::with_capacity(labels.len());
        let mut missing_slots = Vec::with_capacity(labels.len());

        for &feature in features {
            if !self.parameters.exists_labeled(feature) {
                continue;
            }
            missing_labels.clear();
            missing_slots.clear();

            for (slot, &label) in labels.iter().enumerate() {
                match self.cache.find(FeatureLabelPair { feature, label }) {
                    Some(value) => {
                        scores[slot] += value;
                        self.cache.hits += 1;
                    }
                    None => {
                        missing_labels.push(label);
                        missing_slots.push(slot);
                        self.cache.misses += 1;
                    }
                }
            }
            if missing_labels.is_empty() {
                continue;
            }

            // One store lookup for every label the cache could not answer.
            let Some(values) = self.parameters.get_labels(feature, &missing_labels) else {
                continue;
            };
            for ((&slot, &label), value) in missing_slots.iter().zip(&missing_labels).zip(values) {
                scores[slot] += value;
                self.cache.insert(FeatureLabelPair { feature, label }, value);
            }
        }
        scores
    }

    fn cache_stats(&self) -> Option<CacheStats> {
        Some(self.cache.stats())
    }
}

impl Parameters {
    /// Build the scorer selected by `mode`, borrowing this store.
    pub fn scorer(&self, mode: ScoringMode) -> Box<dyn Scorer + '_> {
        match mode {
            ScoringMode::Direct => Box::new(DirectScorer::new(self)),
            ScoringMode::Cached => Box::new(CachedScorer::new(self)),
        }
    }
}

impl Drop for CachedScorer<'_> {
    fn drop(&mut self) {
        let stats = self.cache.stats();
        if stats.hits + stats.misses > 0 {
            log::debug!(
                "label cache: {} hits, {} misses, {} entries",
                stats.hits,
                stats.misses,
                stats.size
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Parameters {
        let mut params = Parameters::new(false);
        params.add_labeled(1, 0, 1.0);
        params.add_labeled(1, 1, 2.0);
        params.add_labeled(2, 1, 4.0);
        params.add(1, 0.5);
        params.stop_growth();
        params
    }

    #[test]
    fn test_cached_matches_direct() {
        let params = store();
        let mut direct = DirectScorer::new(&params);
        let mut cached = CachedScorer::new(&params);

        let features = [1, 2, 3];
        let labels = [1, 0, 9];
        let expected = direct.compute_label_scores(&features, &labels);
        assert_eq!(expected, vec![6.0, 1.0, 0.0]);
        assert_eq!(cached.compute_label_scores(&features, &labels), expected);
        assert_eq!(cached.compute_label_scores(&features, &labels), expected);
        assert_eq!(cached.compute_score(&features), direct.compute_score(&features));
    }

    #[test]
    fn test_counters() {
        let params = store();
        let mut cached = CachedScorer::new(&params);

        // features 1 and 2 exist, 3 does not: 2 features x 2 labels = 4 misses
        cached.compute_label_scores(&[1, 2, 3], &[0, 1]);
        let first = cached.cache_stats().unwrap();
        assert_eq!(first.misses, 4);
        assert_eq!(first.hits, 0);
        assert_eq!(first.size, 4);

        cached.compute_label_scores(&[1, 2, 3], &[0, 1]);
        let second = cached.cache_stats().unwrap();
        assert_eq!(second.misses, 4);
        assert_eq!(second.hits, 4);

        // One new label: only it misses
        cached.compute_label_scores(&[1], &[0, 5]);
        let third = cached.cache_stats().unwrap();
        assert_eq!(third.misses, 5);
        assert_eq!(third.hits, 5);
    }

    #[test]
    fn test_invalidate() {
        let params = store();
        let mut cached = CachedScorer::new(&params);
        cached.compute_label_scores(&[1], &[0]);
        assert_eq!(cached.cache().len(), 1);

        cached.invalidate();
        assert!(cached.cache().is_empty());
        assert_eq!(cached.cache().hits(), 0);
        assert_eq!(cached.cache().misses(), 0);
    }

    #[test]
    fn test_scorer_selection() {
        let params = store();
        let mut direct = params.scorer(ScoringMode::Direct);
        let mut cached = params.scorer(ScoringMode::Cached);

        assert_eq!(
            direct.compute_label_scores(&[1, 2], &[1]),
            cached.compute_label_scores(&[1, 2], &[1])
        );
        assert!(direct.cache_stats().is_none());
        assert_eq!(cached.cache_stats().unwrap().misses, 2);
    }

    #[test]
    fn test_scoring_mode_serde() {
        let mode: ScoringMode = serde_json::from_str("\"cached\"").unwrap();
        assert_eq!(mode, ScoringMode::Cached);
    }
}
