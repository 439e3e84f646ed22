//! Online training loop.
//!
//! [`OnlineTrainer`] owns a [`Parameters`] store and drives epochs over a
//! set of [`TrainingExample`]s: score the parts, decode, update, repeat.
//! The update iteration counter is 1-based and advances once per
//! instance, so after `E` epochs over `N` instances the store is averaged
//! over exactly `E * N` iterations.
//!
//! ```rust
//! use structlearn::decoder::{LabelDecoder, LabelGroups};
//! use structlearn::training::{OnlineTrainer, PartFeatures, TrainingConfig, TrainingExample};
//!
//! let example = TrainingExample {
//!     instance: (),
//!     parts: LabelGroups::from_groups(2, vec![vec![0, 1]]).unwrap(),
//!     features: vec![PartFeatures::labeled(vec![7], 0), PartFeatures::labeled(vec![7], 1)],
//!     gold: vec![0.0, 1.0],
//! };
//!
//! let mut trainer = OnlineTrainer::new(TrainingConfig::default()).unwrap();
//! trainer.train(&LabelDecoder::new(), &[example]).unwrap();
//! assert!(trainer.parameters().get_labeled(7, 1) > trainer.parameters().get_labeled(7, 0));
//! ```

use crate::cache::ScoringMode;
use crate::decoder::{dot, Decoder};
use crate::error::{Error, Result};
use crate::feature::{FeatureId, Label};
use crate::parameters::Parameters;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

// =============================================================================
// Configuration
// =============================================================================

/// Online learning algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Structured perceptron: plain decoding, unit step.
    #[default]
    Perceptron,
    /// Passive-aggressive step sized by the cost-augmented loss.
    Mira,
    /// Stochastic gradient descent on the CRF log-likelihood.
    CrfSgd,
}

/// Training hyperparameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub algorithm: Algorithm,
    pub epochs: usize,
    /// `C`: MIRA step cap, inverse L2 strength for SGD.
    pub regularization_constant: f64,
    /// Initial step size for SGD.
    pub learning_rate: f64,
    pub use_averaging: bool,
    pub shuffle: bool,
    pub seed: u64,
    pub scoring: ScoringMode,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::Perceptron,
            epochs: 10,
            regularization_constant: 1e12,
            learning_rate: 0.01,
            use_averaging: true,
            shuffle: true,
            seed: 42,
            scoring: ScoringMode::Direct,
        }
    }
}

impl TrainingConfig {
    /// Parse a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be at least 1".to_string()));
        }
        if self.regularization_constant.is_nan() || self.regularization_constant <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "regularization_constant must be positive, got {}",
                self.regularization_constant
            )));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.algorithm == Algorithm::CrfSgd && self.use_averaging {
            log::warn!(
                "weight decay does not reach the averaging accumulators; \
                 the averaged CrfSgd model is approximate"
            );
        }
        Ok(())
    }
}

// =============================================================================
// Examples and statistics
// =============================================================================

/// Features that fire for one part.
///
/// Labeled parts score through the labeled weights with their label;
/// unlabeled parts through the plain weights.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartFeatures {
    pub features: Vec<FeatureId>,
    pub label: Option<Label>,
}

impl PartFeatures {
    pub fn unlabeled(features: Vec<FeatureId>) -> Self {
        Self {
            features,
            label: None,
        }
    }

    pub fn labeled(features: Vec<FeatureId>, label: Label) -> Self {
        Self {
            features,
            label: Some(label),
        }
    }
}

/// One instance with its parts, per-part features and gold output.
#[derive(Clone, Debug)]
pub struct TrainingExample<I, P> {
    pub instance: I,
    pub parts: P,
    pub features: Vec<PartFeatures>,
    pub gold: Vec<f64>,
}

/// Totals over one pass through the data.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub loss: f64,
    pub cost: f64,
    /// Instances whose prediction differed from gold.
    pub mistakes: usize,
    pub instances: usize,
    /// Squared norm of the live weights at the end of the epoch.
    pub squared_norm: f64,
}

// =============================================================================
// Trainer
// =============================================================================

pub struct OnlineTrainer {
    config: TrainingConfig,
    parameters: Parameters,
    iteration: usize,
    rng: ChaCha8Rng,
}

impl OnlineTrainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            parameters: Parameters::new(config.use_averaging),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            iteration: 0,
            config,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn into_parameters(self) -> Parameters {
        self.parameters
    }

    /// Update iterations performed so far.
    pub fn iterations(&self) -> usize {
        self.iteration
    }

    /// Run every epoch, then freeze and average the store.
    pub fn train<D>(
        &mut self,
        decoder: &D,
        examples: &[TrainingExample<D::Instance, D::Parts>],
    ) -> Result<Vec<EpochStats>>
    where
        D: Decoder,
        D::Instance: Sized,
        D::Parts: Sized,
    {
        log::info!(
            "Training {:?} for {} epochs on {} instances",
            self.config.algorithm,
            self.config.epochs,
            examples.len()
        );
        self.parameters.allow_growth();

        let mut history = Vec::with_capacity(self.config.epochs);
        for epoch in 0..self.config.epochs {
            history.push(self.train_epoch(decoder, examples, epoch)?);
        }

        self.parameters.stop_growth();
        self.parameters.finalize(self.iteration)?;
        Ok(history)
    }

    /// One pass over `examples`, in shuffled order if configured.
    pub fn train_epoch<D>(
        &mut self,
        decoder: &D,
        examples: &[TrainingExample<D::Instance, D::Parts>],
        epoch: usize,
    ) -> Result<EpochStats>
    where
        D: Decoder,
        D::Instance: Sized,
        D::Parts: Sized,
    {
        let mut order: Vec<usize> = (0..examples.len()).collect();
        if self.config.shuffle {
            order.shuffle(&mut self.rng);
        }

        let mut stats = EpochStats {
            epoch,
            instances: examples.len(),
            ..Default::default()
        };
        for i in order {
            self.iteration += 1;
            let (loss, cost) = self.train_instance(decoder, &examples[i], examples.len())?;
            stats.loss += loss;
            stats.cost += cost;
            if cost > 0.0 {
                stats.mistakes += 1;
            }
        }
        stats.squared_norm = self.parameters.squared_norm();

        log::info!(
            "Epoch {}: loss {:.4}, cost {:.1}, mistakes {}/{}, |w|^2 {:.4}",
            epoch + 1,
            stats.loss,
            stats.cost,
            stats.mistakes,
            stats.instances,
            stats.squared_norm
        );
        Ok(stats)
    }

    /// Returns `(loss, cost)` for the instance.
    fn train_instance<D>(
        &mut self,
        decoder: &D,
        example: &TrainingExample<D::Instance, D::Parts>,
        num_instances: usize,
    ) -> Result<(f64, f64)>
    where
        D: Decoder,
        D::Instance: Sized,
        D::Parts: Sized,
    {
        Error::check_len(example.features.len(), example.gold.len())?;
        let scores = score_parts(&self.parameters, self.config.scoring, &example.features);
        let iteration = self.iteration;

        match self.config.algorithm {
            Algorithm::Perceptron => {
                let predicted = decoder.decode(&example.instance, &example.parts, &scores)?;
                Error::check_len(example.gold.len(), predicted.len())?;
                let cost = hamming(&predicted, &example.gold);
                let loss = (dot(&scores, &predicted) - dot(&scores, &example.gold)).max(0.0);
                for (r, part) in example.features.iter().enumerate() {
                    let gradient = predicted[r] - example.gold[r];
                    if gradient != 0.0 {
                        self.step(part, 1.0, iteration, gradient);
                    }
                }
                Ok((loss, cost))
            }
            Algorithm::Mira => {
                let out = decoder.decode_cost_augmented(
                    &example.instance,
                    &example.parts,
                    &scores,
                    &example.gold,
                )?;
                if out.loss > 0.0 {
                    let norm = difference_norm(&example.features, &out.predicted, &example.gold);
                    if norm > 0.0 {
                        let eta = self.config.regularization_constant.min(out.loss / norm);
                        for (r, part) in example.features.iter().enumerate() {
                            let gradient = out.predicted[r] - example.gold[r];
                            if gradient != 0.0 {
                                self.step(part, eta, iteration, gradient);
                            }
                        }
                    }
                }
                Ok((out.loss, out.cost))
            }
            Algorithm::CrfSgd => {
                let out = decoder.decode_marginals(
                    &example.instance,
                    &example.parts,
                    &scores,
                    &example.gold,
                )?;
                Error::check_len(example.gold.len(), out.marginals.len())?;
                let predicted = decoder.decode(&example.instance, &example.parts, &scores)?;
                let cost = hamming(&predicted, &example.gold);

                let lambda =
                    1.0 / (self.config.regularization_constant * num_instances as f64);
                let eta0 = self.config.learning_rate;
                let t = (iteration - 1) as f64;
                let eta = eta0 / (1.0 + lambda * eta0 * t);

                let decay = 1.0 - eta * lambda;
                if decay <= 0.0 {
                    return Err(Error::InvalidConfig(format!(
                        "learning_rate {} too large for regularization: decay factor {}",
                        eta, decay
                    )));
                }
                self.parameters.scale(decay);

                for (r, part) in example.features.iter().enumerate() {
                    let gradient = out.marginals[r] - example.gold[r];
                    if gradient != 0.0 {
                        self.step(part, eta, iteration, gradient);
                    }
                }
                Ok((out.loss, cost))
            }
        }
    }

    fn step(&mut self, part: &PartFeatures, eta: f64, iteration: usize, gradient: f64) {
        match part.label {
            Some(label) => self.parameters.make_label_gradient_step(
                &part.features,
                eta,
                iteration,
                label,
                gradient,
            ),
            None => self
                .parameters
                .make_gradient_step(&part.features, eta, iteration, gradient),
        }
    }
}

/// Score every part under the current weights.
///
/// The scorer lives only for this call, so a cached scorer never sees a
/// store that has since been updated.
pub fn score_parts(parameters: &Parameters, mode: ScoringMode, parts: &[PartFeatures]) -> Vec<f64> {
    let mut scorer = parameters.scorer(mode);
    parts
        .iter()
        .map(|part| match part.label {
            Some(label) => scorer.compute_label_scores(&part.features, &[label])[0],
            None => scorer.compute_score(&part.features),
        })
        .collect()
}

fn hamming(predicted: &[f64], gold: &[f64]) -> f64 {
    predicted
        .iter()
        .zip(gold)
        .map(|(y, g)| (y - g) * (y - g))
        .sum()
}

/// `‖f(predicted) - f(gold)‖²` over (feature, label) coordinates.
fn difference_norm(parts: &[PartFeatures], predicted: &[f64], gold: &[f64]) -> f64 {
    let mut difference: HashMap<(FeatureId, Option<Label>), f64> = HashMap::new();
    for (r, part) in parts.iter().enumerate() {
        let d = predicted[r] - gold[r];
        if d == 0.0 {
            continue;
        }
        for &feature in &part.features {
            *difference.entry((feature, part.label)).or_insert(0.0) += d;
        }
    }
    difference.values().map(|v| v * v).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{LabelDecoder, LabelGroups};

    const FEATURE_A: FeatureId = 100;
    const FEATURE_B: FeatureId = 200;

    // One slot with two labels; the only feature decides the gold label.
    fn example(feature: FeatureId, gold_label: usize) -> TrainingExample<(), LabelGroups> {
        let mut gold = vec![0.0; 2];
        gold[gold_label] = 1.0;
        TrainingExample {
            instance: (),
            parts: LabelGroups::from_groups(2, vec![vec![0, 1]]).unwrap(),
            features: vec![
                PartFeatures::labeled(vec![feature], 0),
                PartFeatures::labeled(vec![feature], 1),
            ],
            gold,
        }
    }

    fn dataset() -> Vec<TrainingExample<(), LabelGroups>> {
        vec![example(FEATURE_A, 0), example(FEATURE_B, 1)]
    }

    fn config(algorithm: Algorithm) -> TrainingConfig {
        TrainingConfig {
            algorithm,
            epochs: 3,
            ..Default::default()
        }
    }

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn assert_learned(parameters: &Parameters) {
        assert!(parameters.get_labeled(FEATURE_B, 1) > parameters.get_labeled(FEATURE_B, 0));
        assert!(parameters.get_labeled(FEATURE_A, 0) >= parameters.get_labeled(FEATURE_A, 1));
    }

    #[test]
    fn test_config_defaults_validate() {
        assert!(TrainingConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = TrainingConfig::from_json(r#"{"algorithm": "crf_sgd", "epochs": 5}"#).unwrap();
        assert_eq!(config.algorithm, Algorithm::CrfSgd);
        assert_eq!(config.epochs, 5);
        assert_eq!(config.seed, TrainingConfig::default().seed);
    }

    #[test]
    fn test_config_rejects_bad_values() {
        assert!(matches!(
            TrainingConfig::from_json(r#"{"epochs": 0}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TrainingConfig::from_json(r#"{"regularization_constant": -1.0}"#),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            TrainingConfig::from_json(r#"{"algorithm": "adagrad"}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn test_averaged_crf_config_is_accepted() {
        init_logging();
        let config = TrainingConfig {
            algorithm: Algorithm::CrfSgd,
            use_averaging: true,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(OnlineTrainer::new(config).unwrap().parameters().use_average());
    }

    #[test]
    fn test_config_from_file() {
        let path = std::env::temp_dir().join("structlearn_test_config.json");
        std::fs::write(&path, r#"{"algorithm": "mira", "scoring": "cached"}"#).unwrap();

        let config = TrainingConfig::from_json_file(&path).unwrap();
        assert_eq!(config.algorithm, Algorithm::Mira);
        assert_eq!(config.scoring, ScoringMode::Cached);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_perceptron_learns_and_finalizes() {
        init_logging();
        let mut trainer = OnlineTrainer::new(config(Algorithm::Perceptron)).unwrap();
        let history = trainer.train(&LabelDecoder::new(), &dataset()).unwrap();

        assert_eq!(history.len(), 3);
        assert!(history[0].mistakes <= 1);
        assert_eq!(history[2].mistakes, 0);
        assert_eq!(trainer.iterations(), 6);

        let parameters = trainer.parameters();
        assert!(parameters.is_finalized());
        assert!(!parameters.is_growing());
        assert_learned(parameters);
    }

    #[test]
    fn test_mira_first_step_closes_the_margin() {
        let mut trainer = OnlineTrainer::new(TrainingConfig {
            shuffle: false,
            use_averaging: false,
            ..config(Algorithm::Mira)
        })
        .unwrap();
        let stats = trainer
            .train_epoch(&LabelDecoder::new(), &dataset(), 0)
            .unwrap();

        // Zero weights: cost 2 and loss 2 on each instance, eta = 2 / 2
        assert!((stats.loss - 4.0).abs() < 1e-12);
        assert_eq!(stats.mistakes, 2);
        assert!((trainer.parameters().get_labeled(FEATURE_A, 0) - 1.0).abs() < 1e-12);
        assert!((trainer.parameters().get_labeled(FEATURE_A, 1) + 1.0).abs() < 1e-12);

        let stats = trainer
            .train_epoch(&LabelDecoder::new(), &dataset(), 1)
            .unwrap();
        // Margins now match the cost, so no further updates
        assert_eq!(stats.loss, 0.0);
        assert!((trainer.parameters().get_labeled(FEATURE_B, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_crf_sgd_reduces_loss() {
        init_logging();
        let mut trainer = OnlineTrainer::new(TrainingConfig {
            learning_rate: 0.5,
            epochs: 5,
            ..config(Algorithm::CrfSgd)
        })
        .unwrap();
        let history = trainer.train(&LabelDecoder::new(), &dataset()).unwrap();

        // Uniform start: -log(1/2) per instance
        assert!((history[0].loss - 2.0 * 2f64.ln()).abs() < 0.2);
        assert!(history[4].loss < history[0].loss);
        assert_learned(trainer.parameters());
    }

    #[test]
    fn test_cached_scoring_trains_identically() {
        let decoder = LabelDecoder::new();
        let mut direct = OnlineTrainer::new(config(Algorithm::Mira)).unwrap();
        let mut cached = OnlineTrainer::new(TrainingConfig {
            scoring: ScoringMode::Cached,
            ..config(Algorithm::Mira)
        })
        .unwrap();

        direct.train(&decoder, &dataset()).unwrap();
        cached.train(&decoder, &dataset()).unwrap();

        for feature in [FEATURE_A, FEATURE_B] {
            for label in [0, 1] {
                assert_eq!(
                    direct.parameters().get_labeled(feature, label),
                    cached.parameters().get_labeled(feature, label)
                );
            }
        }
    }

    #[test]
    fn test_unlabeled_parts_use_plain_weights() {
        let mut parameters = Parameters::new(false);
        parameters.add(5, 2.0);
        parameters.add_labeled(5, 1, 3.0);

        let parts = [PartFeatures::unlabeled(vec![5]), PartFeatures::labeled(vec![5], 1)];
        assert_eq!(score_parts(&parameters, ScoringMode::Direct, &parts), vec![2.0, 3.0]);
        assert_eq!(score_parts(&parameters, ScoringMode::Cached, &parts), vec![2.0, 3.0]);
    }

    #[test]
    fn test_gold_length_mismatch() {
        let mut bad = example(FEATURE_A, 0);
        bad.gold.push(0.0);
        let mut trainer = OnlineTrainer::new(config(Algorithm::Perceptron)).unwrap();
        assert!(matches!(
            trainer.train(&LabelDecoder::new(), &[bad]),
            Err(Error::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_empty_training_set_cannot_finalize() {
        let mut trainer = OnlineTrainer::new(config(Algorithm::Perceptron)).unwrap();
        let examples: Vec<TrainingExample<(), LabelGroups>> = Vec::new();
        assert!(matches!(
            trainer.train(&LabelDecoder::new(), &examples),
            Err(Error::InvalidIterationCount(0))
        ));
    }
}
