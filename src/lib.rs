//! # Structlearn: Shared Scoring and Learning for Structured Prediction
//!
//! Structlearn is the engine shared by structured NLP tasks (dependency
//! parsing, semantic-role labeling, named-entity recognition,
//! coreference). Each task brings its own decoder; all of them score
//! candidate parts through one sparse hashed parameter store and train
//! through one online update and averaging discipline.
//!
//! ## Quick Start
//!
//! ```rust
//! use structlearn::{FeatureHasher, Parameters, Scorer, ScoringMode};
//!
//! let hasher = FeatureHasher::new();
//! let features = [hasher.hash_str("hw=saw"), hasher.hash_str("mw=dog")];
//!
//! // Train: one gradient step at iteration 1, then average
//! let mut params = Parameters::new(true);
//! params.make_gradient_step(&features, 0.1, 1, 1.0);
//! params.finalize(1)?;
//!
//! // Decode: freeze and score through a scorer
//! params.stop_growth();
//! let mut scorer = params.scorer(ScoringMode::Cached);
//! let score = scorer.compute_score(&features);
//! assert!((score + 0.2).abs() < 1e-12);
//! # Ok::<(), structlearn::Error>(())
//! ```
//!
//! ## Core Concepts
//!
//! - **Parameters**: sparse `feature → weight` and `(feature, label) → weight` maps
//! - **Growth**: frozen stores read unseen keys as 0 and drop their updates
//! - **Averaging**: a lagged accumulator yields the mean of all iterates at finalize
//! - **Scorer**: direct or cached scoring behind one trait
//! - **Decoder**: best, cost-augmented and marginal decoding per task

pub mod cache;
pub mod decoder;
pub mod error;
pub mod feature;
pub mod lexicon;
pub mod parameters;
mod persist;
pub mod sparse;
pub mod training;

// Re-exports for convenience
pub use cache::{CacheStats, CachedScorer, DirectScorer, FeatureLabelCache, Scorer, ScoringMode};
pub use decoder::{CostAugmentedOutput, Decoder, LabelDecoder, LabelGroups, MarginalOutput};
pub use error::{Error, Result};
pub use feature::{FeatureHasher, FeatureId, Label};
pub use lexicon::Lexicon;
pub use parameters::Parameters;
pub use sparse::{SparseLabeledVector, SparseVector};
pub use training::{Algorithm, EpochStats, OnlineTrainer, TrainingConfig, TrainingExample};
