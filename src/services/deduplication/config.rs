//! Deduplication configuration.

use super::similarity::SimilarityWeights;
use serde::{Deserialize, Serialize};

/// Configuration for the deduplicator.
///
/// Loaded from the `[deduplication]` config section.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `COMPOUND_DEDUP_THRESHOLD` | f32 | `0.55` | Near-duplicate threshold (exclusive) |
/// | `COMPOUND_DEDUP_MAX_COMPARISONS` | usize | `500` | Comparison set cap per category |
/// | `COMPOUND_DEDUP_MAX_RETRIES` | u32 | `8` | Compare-and-swap retry budget |
///
/// # Example
///
/// ```rust
/// use compound::services::deduplication::DeduplicationConfig;
///
/// let config = DeduplicationConfig::default().with_similarity_threshold(0.7);
/// assert!((config.similarity_threshold - 0.7).abs() < f32::EPSILON);
/// assert_eq!(config.max_retries, 8);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeduplicationConfig {
    /// A candidate is a near-duplicate when its score is strictly above this.
    pub similarity_threshold: f32,
    /// Weight of the symptom score; the fix score gets `1 - symptom_weight`.
    pub symptom_weight: f32,
    /// Weight of token Jaccard; edit similarity gets `1 - token_weight`.
    pub token_weight: f32,
    /// Maximum number of same-category documents compared, most recently
    /// updated first.
    pub max_comparison_set: usize,
    /// Compare-and-swap retries before giving up with a conflict.
    pub max_retries: u32,
}

impl Default for DeduplicationConfig {
    fn default() -> Self {
        let weights = SimilarityWeights::default();
        Self {
            similarity_threshold: 0.55,
            symptom_weight: weights.symptom_weight,
            token_weight: weights.token_weight,
            max_comparison_set: 500,
            max_retries: 8,
        }
    }
}

impl DeduplicationConfig {
    /// Sets the near-duplicate threshold.
    #[must_use]
    pub const fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Sets the comparison set cap.
    #[must_use]
    pub const fn with_max_comparison_set(mut self, max: usize) -> Self {
        self.max_comparison_set = max;
        self
    }

    /// Sets the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Returns the similarity weights.
    #[must_use]
    pub const fn weights(&self) -> SimilarityWeights {
        SimilarityWeights {
            symptom_weight: self.symptom_weight,
            token_weight: self.token_weight,
        }
    }
}
