//! Label-conjoined sparse weight vector.

use super::{fold_scale, rescaled};
use crate::error::{Error, Result};
use crate::feature::{FeatureId, Label};
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::collections::HashMap;

/// Raw weights of one feature for the labels it has been conjoined with.
///
/// Features rarely fire with more than a handful of labels, so a small
/// unsorted list beats a nested hash map.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LabelWeights {
    entries: Vec<(Label, f64)>,
}

impl LabelWeights {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw (unscaled) weight for `label`, if present.
    pub fn get(&self, label: Label) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|&(_, w)| w)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Label, f64)> + '_ {
        self.entries.iter().copied()
    }

    fn get_mut(&mut self, label: Label) -> Option<&mut f64> {
        self.entries
            .iter_mut()
            .find(|(l, _)| *l == label)
            .map(|(_, w)| w)
    }
}

/// Hashed `(FeatureId, Label) → weight` map.
///
/// Querying by feature alone distinguishes "feature has no labeled entries"
/// from "entries exist but are zero", which lets callers skip absent
/// features without allocating per-label output.
///
/// Growth is tracked per `(feature, label)` pair: a frozen vector ignores
/// updates to unseen features and to unseen labels of known features.
#[derive(Clone, Debug)]
pub struct SparseLabeledVector {
    values: HashMap<FeatureId, LabelWeights>,
    num_entries: usize,
    scale: f64,
    growth_stopped: bool,
}

impl Default for SparseLabeledVector {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseLabeledVector {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            num_entries: 0,
            scale: 1.0,
            growth_stopped: false,
        }
    }

    /// Rebuild a vector from persisted `(key, label, weight)` triples.
    ///
    /// Fails if a `(key, label)` pair appears twice.
    pub fn from_entries(entries: Vec<(FeatureId, Label, f64)>) -> Result<Self> {
        let mut vector = Self::new();
        for (key, label, weight) in entries {
            let weights = vector.values.entry(key).or_default();
            if weights.get(label).is_some() {
                return Err(Error::DuplicateKey(format!("{}/{}", key, label)));
            }
            weights.entries.push((label, weight));
            vector.num_entries += 1;
        }
        Ok(vector)
    }

    /// Number of stored `(feature, label)` pairs.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Number of distinct features with at least one label.
    pub fn num_features(&self) -> usize {
        self.values.len()
    }

    /// Whether `key` has any labeled entry.
    pub fn exists(&self, key: FeatureId) -> bool {
        self.values.contains_key(&key)
    }

    /// Whether the `(key, label)` pair is stored.
    pub fn exists_pair(&self, key: FeatureId, label: Label) -> bool {
        self.values
            .get(&key)
            .is_some_and(|weights| weights.get(label).is_some())
    }

    /// Weight of `(key, label)`, or 0 when absent.
    pub fn get(&self, key: FeatureId, label: Label) -> f64 {
        self.values
            .get(&key)
            .and_then(|weights| weights.get(label))
            .map_or(0.0, |raw| raw * self.scale)
    }

    /// Per-label weights of `key`, or `None` if the feature has no labeled
    /// entries at all. Labels missing for a known feature read as 0.
    pub fn get_labels(&self, key: FeatureId, labels: &[Label]) -> Option<Vec<f64>> {
        let weights = self.values.get(&key)?;
        Some(
            labels
                .iter()
                .map(|&label| weights.get(label).map_or(0.0, |raw| raw * self.scale))
                .collect(),
        )
    }

    /// Add the weights of `key` for `labels` into `scores`.
    ///
    /// Returns false (leaving `scores` untouched) when the feature is absent.
    pub(crate) fn accumulate(&self, key: FeatureId, labels: &[Label], scores: &mut [f64]) -> bool {
        debug_assert_eq!(labels.len(), scores.len());
        let Some(weights) = self.values.get(&key) else {
            return false;
        };
        for (score, &label) in scores.iter_mut().zip(labels) {
            if let Some(raw) = weights.get(label) {
                *score += raw * self.scale;
            }
        }
        true
    }

    /// Add `delta` to the weight of `(key, label)`, honouring the growth flag.
    pub fn add(&mut self, key: FeatureId, label: Label, delta: f64) {
        let raw = delta / self.scale;
        if self.growth_stopped {
            if let Some(value) = self.values.get_mut(&key).and_then(|w| w.get_mut(label)) {
                *value += raw;
            }
            return;
        }
        self.add_or_insert(key, label, delta);
    }

    /// Add `delta` to `(key, label)`, creating it even when growth is stopped.
    pub(crate) fn add_or_insert(&mut self, key: FeatureId, label: Label, delta: f64) {
        let raw = delta / self.scale;
        let weights = self.values.entry(key).or_default();
        match weights.get_mut(label) {
            Some(value) => *value += raw,
            None => {
                weights.entries.push((label, raw));
                self.num_entries += 1;
            }
        }
    }

    /// Add every weight of `other` into this vector.
    pub fn add_vector(&mut self, other: &SparseLabeledVector) {
        for (key, label, weight) in other.iter() {
            self.add(key, label, weight);
        }
    }

    pub fn scale(&mut self, factor: f64) {
        if let Some((previous, factor)) = fold_scale(&mut self.scale, factor) {
            for weights in self.values.values_mut() {
                for (_, value) in weights.entries.iter_mut() {
                    *value = rescaled(*value, previous, factor);
                }
            }
        }
    }

    pub fn squared_norm(&self) -> f64 {
        let raw: f64 = self
            .values
            .values()
            .flat_map(|weights| weights.iter())
            .map(|(_, v)| v * v)
            .sum();
        raw * self.scale * self.scale
    }

    pub fn allow_growth(&mut self) {
        self.growth_stopped = false;
    }

    pub fn stop_growth(&mut self) {
        self.growth_stopped = true;
    }

    pub fn is_growing(&self) -> bool {
        !self.growth_stopped
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.num_entries = 0;
        self.scale = 1.0;
    }

    /// Iterate over `(key, label, weight)` with the scale applied.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, Label, f64)> + '_ {
        let scale = self.scale;
        self.values.iter().flat_map(move |(&key, weights)| {
            weights
                .iter()
                .map(move |(label, raw)| (key, label, raw * scale))
        })
    }
}

impl Serialize for SparseLabeledVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        // bincode needs the length up front
        let mut seq = serializer.serialize_seq(Some(self.num_entries))?;
        for entry in self.iter() {
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }
}
