//! Feature identifiers and deterministic feature hashing.
//!
//! Feature templates produce strings (or small tuples of integer atoms)
//! describing a context, e.g. `"hw=saw|mw=dog"`. The parameter store
//! never sees those strings: it is keyed by a 64-bit [`FeatureId`] that is
//! derived deterministically, so the same template always maps to the
//! same key across runs and machines.

use sha2::{Digest, Sha256};

/// 64-bit hashed identifier of an unlabeled feature.
///
/// Opaque and collision tolerant: two templates hashing to the same id
/// simply share a weight.
pub type FeatureId = u64;

/// Small non-negative integer naming an output category.
pub type Label = u32;

/// Maps feature templates to [`FeatureId`]s.
///
/// Uses SHA-256 of `(seed || input)` and keeps the first 8 bytes, so the
/// mapping is stable and independent of the process hasher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FeatureHasher {
    seed: u64,
}

impl FeatureHasher {
    /// Create a hasher with the default seed.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a hasher with a specific seed.
    ///
    /// Models trained with one seed must be decoded with the same seed.
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Hash a rendered feature template.
    pub fn hash_str(&self, template: &str) -> FeatureId {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update(template.as_bytes());
        Self::truncate(&hasher.finalize())
    }

    /// Hash a template code together with integer atoms (word ids, tag ids...).
    ///
    /// Avoids rendering strings in the feature-extraction hot path.
    pub fn hash_atoms(&self, template: u8, atoms: &[u64]) -> FeatureId {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_le_bytes());
        hasher.update([template]);
        for atom in atoms {
            hasher.update(atom.to_le_bytes());
        }
        Self::truncate(&hasher.finalize())
    }

    fn truncate(digest: &[u8]) -> FeatureId {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

/// Cheap hash combination for composing ids already in hand.
///
/// Not collision resistant; use [`FeatureHasher`] for template keys.
pub fn combine(seed: u64, value: u64) -> u64 {
    seed ^ (value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(seed << 6)
        .wrapping_add(seed >> 2))
}
