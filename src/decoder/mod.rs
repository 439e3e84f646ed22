//! Task-agnostic decoder contract.
//!
//! Every task (dependency parsing, semantic roles, entities, coreference)
//! scores a flat list of *parts* and hands the scores to its own structural
//! solver. The solver answers in one of three modes:
//!
//! - [`Decoder::decode`]: the highest-scoring feasible structure.
//! - [`Decoder::decode_cost_augmented`]: the structure maximizing
//!   `score + cost(gold)`, for margin-based training.
//! - [`Decoder::decode_marginals`]: per-part marginals, entropy and
//!   likelihood loss, for CRF-style training.
//!
//! Outputs are indicator vectors indexed like the parts (1.0 = part
//! selected). Marginal outputs hold probabilities in the same layout.
//!
//! Tasks implement [`Decoder`] once; callers dispatch statically when the
//! task is known, or through `Box<dyn Decoder<Instance = I, Parts = P>>`
//! when it is picked at runtime.

pub mod labeler;

pub use labeler::{LabelDecoder, LabelGroups};

use crate::error::{Error, Result};

/// Losses this far below zero are numerical noise and clamp to 0.
pub const LOSS_TOLERANCE: f64 = 1e-6;

/// Result of cost-augmented decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct CostAugmentedOutput {
    pub predicted: Vec<f64>,
    /// Structural distance of `predicted` from gold.
    pub cost: f64,
    /// `score(predicted) + cost - score(gold)`, never negative.
    pub loss: f64,
}

/// Result of marginal decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct MarginalOutput {
    pub marginals: Vec<f64>,
    pub entropy: f64,
    /// Negative log-likelihood of gold.
    pub loss: f64,
}

/// Structural solver of one task.
pub trait Decoder {
    /// Task input (sentence, document...).
    type Instance: ?Sized;
    /// Enumerated candidate parts of one instance.
    type Parts: ?Sized;

    /// Best feasible output under `scores`.
    fn decode(
        &self,
        instance: &Self::Instance,
        parts: &Self::Parts,
        scores: &[f64],
    ) -> Result<Vec<f64>>;

    /// Loss-augmented inference with a Hamming cost.
    ///
    /// Adds `1 - 2*gold[r]` to each part score, which makes the decoder
    /// maximize `score + Σ_r (y_r - gold_r)^2` over binary outputs.
    fn decode_cost_augmented(
        &self,
        instance: &Self::Instance,
        parts: &Self::Parts,
        scores: &[f64],
        gold: &[f64],
    ) -> Result<CostAugmentedOutput> {
        Error::check_len(scores.len(), gold.len())?;

        let p: Vec<f64> = gold.iter().map(|&g| 1.0 - 2.0 * g).collect();
        let q: f64 = gold.iter().sum();
        let augmented: Vec<f64> = scores.iter().zip(&p).map(|(s, p)| s + p).collect();

        let predicted = self.decode(instance, parts, &augmented)?;
        Error::check_len(scores.len(), predicted.len())?;

        let cost = q + dot(&p, &predicted);
        let margin: f64 = scores
            .iter()
            .zip(predicted.iter().zip(gold))
            .map(|(s, (y, g))| s * (y - g))
            .sum();
        let loss = check_loss(cost + margin)?;

        Ok(CostAugmentedOutput {
            predicted,
            cost,
            loss,
        })
    }

    /// Marginals, entropy and gold loss under the task's output distribution.
    fn decode_marginals(
        &self,
        instance: &Self::Instance,
        parts: &Self::Parts,
        scores: &[f64],
        gold: &[f64],
    ) -> Result<MarginalOutput>;
}

/// Reject clearly negative losses and clamp numerical noise.
pub fn check_loss(loss: f64) -> Result<f64> {
    if loss >= 0.0 {
        return Ok(loss);
    }
    if loss > -LOSS_TOLERANCE {
        log::warn!("negative loss {} set to zero", loss);
        return Ok(0.0);
    }
    Err(Error::NegativeLoss { loss })
}

/// Same tolerance rule as [`check_loss`], for marginal entropies.
pub fn check_entropy(entropy: f64) -> Result<f64> {
    if entropy >= 0.0 {
        return Ok(entropy);
    }
    if entropy > -LOSS_TOLERANCE {
        log::warn!("negative entropy {} set to zero", entropy);
        return Ok(0.0);
    }
    Err(Error::NegativeEntropy { entropy })
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// `log(Σ exp(x))`, stable for large inputs. `-inf` for an empty slice.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}

/// Normalized exponentials of `values` and their log-partition.
pub fn softmax(values: &[f64]) -> (Vec<f64>, f64) {
    let log_z = log_sum_exp(values);
    let probs = values.iter().map(|v| (v - log_z).exp()).collect();
    (probs, log_z)
}
