//! Sparse hashed weight vectors.
//!
//! Two flavours share the same lifecycle:
//!
//! - [`SparseVector`]: `FeatureId → weight` for unlabeled features.
//! - [`SparseLabeledVector`]: `(FeatureId, Label) → weight` for features
//!   conjoined with output labels.
//!
//! Both carry a growth flag. While growth is allowed, touching an unseen
//! key inserts it with weight 0 before the update is applied. While growth
//! is stopped, unseen keys read as 0 and updates to them are dropped, which
//! bounds memory once a model moves from training to decoding.
//!
//! Both also store a lazy scale factor so that `scale` is O(1) regardless
//! of how many weights are stored.

pub mod labeled;
pub mod vector;

pub use labeled::{LabelWeights, SparseLabeledVector};
pub use vector::SparseVector;

/// The lazy scale factor is kept within `[SCALE_THRESHOLD, 1/SCALE_THRESHOLD]`
/// in magnitude; outside that range it is folded into the values.
pub(crate) const SCALE_THRESHOLD: f64 = 1e-9;

/// Fold `factor` into a lazy `scale`.
///
/// Returns `None` when the product stays in range. Otherwise resets
/// `scale` to 1 and returns `(previous scale, factor)`, which the caller
/// must apply to every raw value through [`rescaled`].
pub(crate) fn fold_scale(scale: &mut f64, factor: f64) -> Option<(f64, f64)> {
    let next = *scale * factor;
    if next.is_finite() && (SCALE_THRESHOLD..=1.0 / SCALE_THRESHOLD).contains(&next.abs()) {
        *scale = next;
        return None;
    }
    let previous = *scale;
    *scale = 1.0;
    Some((previous, factor))
}

/// Raw value after an eager rescale. Multiplying by 0 always yields 0.
pub(crate) fn rescaled(raw: f64, previous: f64, factor: f64) -> f64 {
    if factor == 0.0 {
        0.0
    } else {
        raw * previous * factor
    }
}
