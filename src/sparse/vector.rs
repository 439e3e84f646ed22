//! Unlabeled sparse weight vector.

use super::{fold_scale, rescaled};
use crate::error::{Error, Result};
use crate::feature::FeatureId;
use serde::ser::{Serialize, SerializeSeq, Serializer};
use std::collections::HashMap;

/// Hashed `FeatureId → weight` map with a growth flag and lazy scaling.
///
/// The stored value of a key is `raw * scale`; only `raw` lives in the map.
#[derive(Clone, Debug)]
pub struct SparseVector {
    values: HashMap<FeatureId, f64>,
    scale: f64,
    growth_stopped: bool,
}

impl Default for SparseVector {
    fn default() -> Self {
        Self::new()
    }
}

impl SparseVector {
    /// Create an empty vector that accepts new keys.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            scale: 1.0,
            growth_stopped: false,
        }
    }

    /// Rebuild a vector from persisted `(key, weight)` entries.
    ///
    /// Fails if a key appears twice. Growth is left allowed.
    pub fn from_entries(entries: Vec<(FeatureId, f64)>) -> Result<Self> {
        let mut values = HashMap::with_capacity(entries.len());
        for (key, weight) in entries {
            if values.insert(key, weight).is_some() {
                return Err(Error::DuplicateKey(key.to_string()));
            }
        }
        Ok(Self {
            values,
            scale: 1.0,
            growth_stopped: false,
        })
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn exists(&self, key: FeatureId) -> bool {
        self.values.contains_key(&key)
    }

    /// Weight of `key`, or 0 when absent. Never inserts.
    pub fn get(&self, key: FeatureId) -> f64 {
        self.values.get(&key).map_or(0.0, |&raw| raw * self.scale)
    }

    /// Add `delta` to the weight of `key`.
    ///
    /// Unseen keys are created with weight 0 first when growth is allowed,
    /// and ignored otherwise.
    pub fn add(&mut self, key: FeatureId, delta: f64) {
        let raw = delta / self.scale;
        if self.growth_stopped {
            if let Some(value) = self.values.get_mut(&key) {
                *value += raw;
            }
        } else {
            *self.values.entry(key).or_insert(0.0) += raw;
        }
    }

    /// Add `delta` to `key`, creating it even when growth is stopped.
    pub(crate) fn add_or_insert(&mut self, key: FeatureId, delta: f64) {
        *self.values.entry(key).or_insert(0.0) += delta / self.scale;
    }

    /// Add every weight of `other` into this vector.
    pub fn add_vector(&mut self, other: &SparseVector) {
        for (key, weight) in other.iter() {
            self.add(key, weight);
        }
    }

    /// Multiply every weight by `factor`.
    pub fn scale(&mut self, factor: f64) {
        if let Some((previous, factor)) = fold_scale(&mut self.scale, factor) {
            for value in self.values.values_mut() {
                *value = rescaled(*value, previous, factor);
            }
        }
    }

    /// Sum of squared weights.
    pub fn squared_norm(&self) -> f64 {
        let raw: f64 = self.values.values().map(|&v| v * v).sum();
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

    /// Drop every entry. The growth flag is kept.
    pub fn clear(&mut self) {
        self.values.clear();
        self.scale = 1.0;
    }

    /// Iterate over `(key, weight)` with the scale applied.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, f64)> + '_ {
        let scale = self.scale;
        self.values.iter().map(move |(&key, &raw)| (key, raw * scale))
    }
}

impl Serialize for SparseVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
        for entry in self.iter() {
            seq.serialize_element(&entry)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_key_reads_zero() {
        let v = SparseVector::new();
        assert_eq!(v.get(17), 0.0);
        assert!(!v.exists(17));
        assert!(v.is_empty());
    }

    #[test]
    fn test_add_with_growth() {
        let mut v = SparseVector::new();
        v.add(5, 1.5);
        v.add(5, -0.5);

        assert!(v.exists(5));
        assert_eq!(v.get(5), 1.0);
        assert_eq!(v.len(), 1);
    }

    #[test]
    fn test_frozen_vector_ignores_unseen_keys() {
        let mut v = SparseVector::new();
        v.add(1, 2.0);
        v.stop_growth();

        v.add(2, 3.0);
        v.add(1, 1.0);

        assert!(!v.exists(2));
        assert_eq!(v.get(2), 0.0);
        assert_eq!(v.get(1), 3.0);

        v.allow_growth();
        v.add(2, 3.0);
        assert_eq!(v.get(2), 3.0);
    }

    #[test]
    fn test_lazy_scale() {
        let mut v = SparseVector::new();
        v.add(1, 2.0);
        v.add(2, -4.0);

        v.scale(0.5);
        assert!((v.get(1) - 1.0).abs() < 1e-12);
        assert!((v.get(2) + 2.0).abs() < 1e-12);
        assert!((v.squared_norm() - 5.0).abs() < 1e-12);

        // Adds after scaling land at their face value
        v.add(1, 1.0);
        assert!((v.get(1) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_scale_renormalizes_small_factors() {
        let mut v = SparseVector::new();
        v.add(1, 1e6);
        v.scale(1e-10);
        assert!((v.get(1) - 1e-4).abs() < 1e-16);

        v.scale(0.0);
        assert_eq!(v.get(1), 0.0);
        v.add(1, 2.0);
        assert_eq!(v.get(1), 2.0);
    }

    #[test]
    fn test_scale_survives_huge_factors() {
        let mut v = SparseVector::new();
        v.add(1, 0.0);
        v.add(2, 1.0);

        v.scale(1e200);
        v.scale(1e200);
        assert_eq!(v.get(1), 0.0);
        assert!(!v.get(2).is_nan());

        v.scale(0.0);
        assert_eq!(v.get(1), 0.0);
        assert_eq!(v.get(2), 0.0);
        v.add(2, 3.0);
        assert_eq!(v.get(2), 3.0);
    }

    #[test]
    fn test_scale_folds_large_products() {
        let mut v = SparseVector::new();
        v.add(1, 2.0);
        v.scale(1e6);
        v.scale(1e6);
        assert!((v.get(1) - 2e12).abs() < 1e-3);

        v.scale(1e-12);
        assert!((v.get(1) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_add_or_insert_ignores_growth_flag() {
        let mut v = SparseVector::new();
        v.stop_growth();
        v.add(4, 1.0);
        assert!(!v.exists(4));

        v.add_or_insert(4, 1.5);
        assert_eq!(v.get(4), 1.5);
    }

    #[test]
    fn test_add_vector() {
        let mut a = SparseVector::new();
        let mut b = SparseVector::new();
        a.add(1, 1.0);
        b.add(1, 2.0);
        b.add(3, -1.0);

        a.add_vector(&b);
        assert_eq!(a.get(1), 3.0);
        assert_eq!(a.get(3), -1.0);
    }

    #[test]
    fn test_from_entries_rejects_duplicates() {
        assert!(SparseVector::from_entries(vec![(1, 1.0), (2, 2.0)]).is_ok());
        assert!(matches!(
            SparseVector::from_entries(vec![(1, 1.0), (1, 2.0)]),
            Err(Error::DuplicateKey(_))
        ));
    }
}
