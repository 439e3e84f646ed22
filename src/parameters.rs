//! Model parameters: unlabeled and label-conjoined weights with averaging.
//!
//! # Averaging
//!
//! Averaged perceptron/MIRA reports the mean of the weight vectors seen
//! during training instead of the last one. Storing a snapshot per
//! iteration is out of the question for hundreds of millions of features,
//! so each weight vector gets a companion accumulator instead.
//!
//! With `u_t` the total increment applied during iteration `t` (1-based),
//! the weights after iteration `t` are `w_t = u_1 + ... + u_t`, and
//!
//! ```text
//! (w_1 + ... + w_T) / T = w_T - (0*u_1 + 1*u_2 + ... + (T-1)*u_T) / T
//! ```
//!
//! A gradient step at iteration `t` adds `-eta*g` to the weight and
//! `(t-1)*eta*g` to the accumulator, so [`Parameters::finalize`] only has to
//! scale the accumulator by `1/T` and add it into the weights.

use crate::error::{Error, Result};
use crate::feature::{FeatureId, Label};
use crate::persist;
use crate::sparse::{SparseLabeledVector, SparseVector};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// The weight store shared by every task pipeline.
///
/// Created empty and growing, mutated only during training, frozen with
/// [`stop_growth`](Self::stop_growth) before decoding, finalized at most
/// once, then saved.
#[derive(Clone, Debug)]
pub struct Parameters {
    use_average: bool,
    finalized: bool,

    weights: SparseVector,
    averaged_weights: SparseVector,

    labeled_weights: SparseLabeledVector,
    averaged_labeled_weights: SparseLabeledVector,
}

impl Default for Parameters {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Parameters {
    /// Create an empty, growing store.
    ///
    /// With `use_average` the store keeps accumulators for averaging.
    pub fn new(use_average: bool) -> Self {
        Self {
            use_average,
            finalized: false,
            weights: SparseVector::new(),
            averaged_weights: SparseVector::new(),
            labeled_weights: SparseLabeledVector::new(),
            averaged_labeled_weights: SparseLabeledVector::new(),
        }
    }

    pub fn use_average(&self) -> bool {
        self.use_average
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    pub fn weights(&self) -> &SparseVector {
        &self.weights
    }

    pub fn labeled_weights(&self) -> &SparseLabeledVector {
        &self.labeled_weights
    }

    // =========================================================================
    // Growth
    // =========================================================================

    /// Let unseen keys be inserted on first update.
    pub fn allow_growth(&mut self) {
        log::debug!("allowing parameter growth");
        self.weights.allow_growth();
        self.averaged_weights.allow_growth();
        self.labeled_weights.allow_growth();
        self.averaged_labeled_weights.allow_growth();
    }

    /// Freeze the key set: unseen keys read as 0 and are never inserted.
    pub fn stop_growth(&mut self) {
        log::debug!("stopping parameter growth at {} entries", self.size());
        self.weights.stop_growth();
        self.averaged_weights.stop_growth();
        self.labeled_weights.stop_growth();
        self.averaged_labeled_weights.stop_growth();
    }

    pub fn is_growing(&self) -> bool {
        self.weights.is_growing()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Number of stored weights.
    ///
    /// A labeled feature counts once per conjoined label.
    pub fn size(&self) -> usize {
        self.weights.len() + self.labeled_weights.len()
    }

    pub fn exists(&self, key: FeatureId) -> bool {
        self.weights.exists(key)
    }

    pub fn exists_labeled(&self, key: FeatureId) -> bool {
        self.labeled_weights.exists(key)
    }

    /// Weight of an unlabeled feature, 0 when absent.
    pub fn get(&self, key: FeatureId) -> f64 {
        self.weights.get(key)
    }

    /// Weights of `key` conjoined with each of `labels`.
    ///
    /// `None` means the feature has no labeled entries at all.
    pub fn get_labels(&self, key: FeatureId, labels: &[Label]) -> Option<Vec<f64>> {
        self.labeled_weights.get_labels(key, labels)
    }

    /// Weight of a single `(key, label)` pair, 0 when absent.
    pub fn get_labeled(&self, key: FeatureId, label: Label) -> f64 {
        self.labeled_weights.get(key, label)
    }

    pub fn squared_norm(&self) -> f64 {
        self.weights.squared_norm() + self.labeled_weights.squared_norm()
    }

    /// Sum of the weights of `features`.
    pub fn compute_score(&self, features: &[FeatureId]) -> f64 {
        features.iter().map(|&f| self.weights.get(f)).sum()
    }

    /// Per-label sum of the labeled weights of `features`.
    pub fn compute_label_scores(&self, features: &[FeatureId], labels: &[Label]) -> Vec<f64> {
        let mut scores = vec![0.0; labels.len()];
        for &feature in features {
            self.labeled_weights.accumulate(feature, labels, &mut scores);
        }
        scores
    }

    // =========================================================================
    // Updates
    // =========================================================================

    pub fn add(&mut self, key: FeatureId, delta: f64) {
        self.weights.add(key, delta);
    }

    pub fn add_labeled(&mut self, key: FeatureId, label: Label, delta: f64) {
        self.labeled_weights.add(key, label, delta);
    }

    /// Multiply every weight (unlabeled and labeled) by `factor`.
    ///
    /// Only the live weights are scaled, not the averaging accumulators.
    /// Mixing `scale` with averaged gradient steps therefore makes
    /// [`finalize`](Self::finalize) return neither the mean of the iterates
    /// nor the last weights: one unit step, `scale(0.5)`, `finalize(2)`
    /// yields 0.5 where the mean is 0.75.
    pub fn scale(&mut self, factor: f64) {
        self.weights.scale(factor);
        self.labeled_weights.scale(factor);
    }

    /// Move each feature's weight by `-eta * gradient`.
    ///
    /// `iteration` is the 1-based index of the current update iteration;
    /// several steps may share an iteration.
    pub fn make_gradient_step(
        &mut self,
        features: &[FeatureId],
        eta: f64,
        iteration: usize,
        gradient: f64,
    ) {
        if self.reject_after_finalize() {
            return;
        }
        let lag = iteration.saturating_sub(1) as f64;
        for &feature in features {
            self.weights.add(feature, -eta * gradient);
            // Every stored weight tracks its increments, frozen or not
            if self.use_average && self.weights.exists(feature) {
                self.averaged_weights
                    .add_or_insert(feature, lag * eta * gradient);
            }
        }
    }

    /// Same as [`make_gradient_step`](Self::make_gradient_step) for features
    /// conjoined with `label`.
    pub fn make_label_gradient_step(
        &mut self,
        features: &[FeatureId],
        eta: f64,
        iteration: usize,
        label: Label,
        gradient: f64,
    ) {
        if self.reject_after_finalize() {
            return;
        }
        let lag = iteration.saturating_sub(1) as f64;
        for &feature in features {
            self.labeled_weights.add(feature, label, -eta * gradient);
            if self.use_average && self.labeled_weights.exists_pair(feature, label) {
                self.averaged_labeled_weights
                    .add_or_insert(feature, label, lag * eta * gradient);
            }
        }
    }

    /// Replace the weights with their average over `num_iterations`.
    ///
    /// Must be called once, after the last update, with the exact number of
    /// update iterations performed. A no-op on the weights when averaging
    /// is disabled, but still marks the store as finalized.
    pub fn finalize(&mut self, num_iterations: usize) -> Result<()> {
        if self.finalized {
            return Err(Error::AlreadyFinalized);
        }
        if num_iterations == 0 {
            return Err(Error::InvalidIterationCount(num_iterations));
        }
        if self.use_average {
            log::info!("Averaging the weights over {} iterations", num_iterations);
            let inv = 1.0 / num_iterations as f64;

            self.averaged_weights.scale(inv);
            self.weights.add_vector(&self.averaged_weights);

            self.averaged_labeled_weights.scale(inv);
            self.labeled_weights
                .add_vector(&self.averaged_labeled_weights);

            self.averaged_weights.clear();
            self.averaged_labeled_weights.clear();
        }
        self.finalized = true;
        Ok(())
    }

    fn reject_after_finalize(&self) -> bool {
        if self.finalized {
            log::warn!("ignoring gradient step on finalized parameters");
        }
        self.finalized
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Write the weights (unlabeled map, then labeled map).
    ///
    /// Accumulators are never written; finalize first.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        if self.use_average && !self.finalized {
            log::warn!("saving parameters that were never averaged");
        }
        persist::write_weights(writer, &self.weights, &self.labeled_weights)?;
        log::info!(
            "saved {} unlabeled and {} labeled weights",
            self.weights.len(),
            self.labeled_weights.len()
        );
        Ok(())
    }

    /// Replace the weights with the ones read from `reader`.
    ///
    /// Accumulators are cleared, the store counts as not finalized, and the
    /// growth flag is kept.
    pub fn load<R: Read>(&mut self, reader: R) -> Result<()> {
        let (mut weights, mut labeled_weights) = persist::read_weights(reader)?;
        if !self.is_growing() {
            weights.stop_growth();
            labeled_weights.stop_growth();
        }
        log::info!(
            "loaded {} unlabeled and {} labeled weights",
            weights.len(),
            labeled_weights.len()
        );
        self.weights = weights;
        self.labeled_weights = labeled_weights;
        self.averaged_weights.clear();
        self.averaged_labeled_weights.clear();
        self.finalized = false;
        Ok(())
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load_from_path<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.load(BufReader::new(File::open(path)?))
    }
}
