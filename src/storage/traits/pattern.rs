//! Critical pattern store trait.

use crate::models::{CriticalPattern, PatternId};
use crate::{Error, Result};

/// Trait for critical pattern storage.
pub trait PatternStore: Send + Sync {
    /// Retrieves a pattern by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no pattern has this ID.
    fn get_pattern(&self, id: &PatternId) -> Result<CriticalPattern>;

    /// Lists every pattern, active or demoted, sorted by ID.
    fn patterns(&self) -> Result<Vec<CriticalPattern>>;

    /// Inserts a pattern unless an existing pattern already references any
    /// document of its cluster (or its source document).
    ///
    /// The check and the insert are a single atomic step, so two concurrent
    /// promotions of the same cluster yield exactly one pattern. Returns
    /// `true` if the pattern was inserted.
    fn insert_pattern_if_unclaimed(&self, pattern: &CriticalPattern) -> Result<bool>;

    /// Marks a pattern as no longer active.
    ///
    /// Returns the demoted pattern. Demoting twice is a no-op.
    fn demote_pattern(&self, id: &PatternId) -> Result<CriticalPattern>;

    /// Lists active patterns, sorted by ID.
    fn active_patterns(&self) -> Result<Vec<CriticalPattern>> {
        Ok(self
            .patterns()?
            .into_iter()
            .filter(|p| p.still_active)
            .collect())
    }
}

/// Builds the not-found error for a pattern ID.
pub(crate) fn pattern_not_found(id: &PatternId) -> Error {
    Error::NotFound {
        kind: "pattern",
        id: id.to_string(),
    }
}
