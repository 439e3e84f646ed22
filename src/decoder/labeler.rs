//! Skeleton-then-label decoding.
//!
//! Many tasks split a structure into a skeleton (which arcs, which
//! predicate-argument pairs, which spans) and one label per skeleton slot.
//! Once the skeleton is fixed, the label of each slot is independent of the
//! others, so decoding reduces to a per-slot argmax and marginals to a
//! per-slot softmax.
//!
//! [`LabelGroups`] describes the slots: each group lists the part indices
//! of one slot's candidate labels. A feasible output selects exactly one
//! part per group.

use super::{check_entropy, check_loss, dot, softmax, Decoder, MarginalOutput};
use crate::error::{Error, Result};

/// Partition of part indices into label groups.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelGroups {
    groups: Vec<Vec<usize>>,
    num_parts: usize,
    owner: Vec<Option<usize>>,
}

impl LabelGroups {
    /// Create an empty layout over `num_parts` parts.
    pub fn new(num_parts: usize) -> Self {
        Self {
            groups: Vec::new(),
            num_parts,
            owner: vec![None; num_parts],
        }
    }

    /// Build a layout from explicit groups.
    pub fn from_groups(num_parts: usize, groups: Vec<Vec<usize>>) -> Result<Self> {
        let mut layout = Self::new(num_parts);
        for group in groups {
            layout.push_group(group)?;
        }
        Ok(layout)
    }

    /// Append one slot. Its parts must be in range, non-empty, and not
    /// already owned by another group.
    pub fn push_group(&mut self, parts: Vec<usize>) -> Result<usize> {
        if parts.is_empty() {
            return Err(Error::InvalidParts("empty label group".to_string()));
        }
        let id = self.groups.len();
        for &part in &parts {
            match self.owner.get(part) {
                None => {
                    return Err(Error::InvalidParts(format!(
                        "part {} out of range for {} parts",
                        part, self.num_parts
                    )))
                }
                Some(Some(other)) => {
                    return Err(Error::InvalidParts(format!(
                        "part {} already belongs to group {}",
                        part, other
                    )))
                }
                Some(None) => {}
            }
        }
        for &part in &parts {
            self.owner[part] = Some(id);
        }
        self.groups.push(parts);
        Ok(id)
    }

    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn group(&self, id: usize) -> Option<&[usize]> {
        self.groups.get(id).map(Vec::as_slice)
    }

    pub fn groups(&self) -> impl Iterator<Item = &[usize]> {
        self.groups.iter().map(Vec::as_slice)
    }

    /// Group owning `part`, if any.
    pub fn group_of(&self, part: usize) -> Option<usize> {
        self.owner.get(part).copied().flatten()
    }
}

/// Exact decoder for independent per-slot label choices.
///
/// The marginal mode is a product of per-group softmax distributions
/// (a CRF with no interactions between slots).
#[derive(Clone, Copy, Debug, Default)]
pub struct LabelDecoder;

impl LabelDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Best part of each group. Ties go to the first listed part.
    pub fn decode_labels(&self, parts: &LabelGroups, scores: &[f64]) -> Result<Vec<usize>> {
        Error::check_len(parts.num_parts(), scores.len())?;
        Ok(parts
            .groups()
            .map(|group| {
                let mut best = group[0];
                for &part in &group[1..] {
                    if scores[part] > scores[best] {
                        best = part;
                    }
                }
                best
            })
            .collect())
    }

    /// Per-group log-partition and per-part label marginals.
    ///
    /// Parts outside every group get marginal 0.
    pub fn decode_label_marginals(
        &self,
        parts: &LabelGroups,
        scores: &[f64],
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        Error::check_len(parts.num_parts(), scores.len())?;
        let mut total_scores = Vec::with_capacity(parts.num_groups());
        let mut marginals = vec![0.0; scores.len()];

        for group in parts.groups() {
            let group_scores: Vec<f64> = group.iter().map(|&r| scores[r]).collect();
            let (probs, log_z) = softmax(&group_scores);
            for (&r, p) in group.iter().zip(probs) {
                marginals[r] = p;
            }
            total_scores.push(log_z);
        }
        Ok((total_scores, marginals))
    }
}

impl Decoder for LabelDecoder {
    type Instance = ();
    type Parts = LabelGroups;

    fn decode(&self, _: &(), parts: &LabelGroups, scores: &[f64]) -> Result<Vec<f64>> {
        let mut predicted = vec![0.0; scores.len()];
        for best in self.decode_labels(parts, scores)? {
            predicted[best] = 1.0;
        }
        Ok(predicted)
    }

    fn decode_marginals(
        &self,
        _: &(),
        parts: &LabelGroups,
        scores: &[f64],
        gold: &[f64],
    ) -> Result<MarginalOutput> {
        Error::check_len(scores.len(), gold.len())?;
        let (total_scores, marginals) = self.decode_label_marginals(parts, scores)?;
        let log_partition: f64 = total_scores.iter().sum();

        let entropy = check_entropy(log_partition - dot(scores, &marginals))?;
        let loss = check_loss(log_partition - dot(scores, gold))?;

        Ok(MarginalOutput {
            marginals,
            entropy,
            loss,
        })
    }
}
