//! Search result types.

use super::{CriticalPattern, SolutionDocument};
use serde::Serialize;

/// A single ranked search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// The matched document.
    pub document: SolutionDocument,
    /// Ranking score (relevance with occurrence and recency boost).
    pub score: f32,
    /// The active critical pattern sourced from this document, if any.
    ///
    /// Hits carrying a pattern always rank ahead of ordinary hits.
    pub pattern: Option<CriticalPattern>,
}

impl SearchHit {
    /// Returns true if this hit is an enforced critical pattern.
    #[must_use]
    pub const fn is_pattern(&self) -> bool {
        self.pattern.is_some()
    }
}
