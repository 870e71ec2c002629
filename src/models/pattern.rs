//! Critical patterns promoted from recurring solutions.

use super::SolutionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of a critical pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternId(String);

impl PatternId {
    /// Creates a pattern ID from a raw string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh, time-ordered pattern ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("cp-{}", uuid::Uuid::now_v7().simple()))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PatternId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An enforced rule promoted from a recurring solution cluster.
///
/// Demotion (`still_active = false`) is the only mutation after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalPattern {
    /// Pattern identifier.
    pub pattern_id: PatternId,
    /// The highest-occurrence document of the promoted cluster.
    pub source_document_id: SolutionId,
    /// Short imperative rule.
    pub statement: String,
    /// When the pattern was promoted.
    pub promoted_at: DateTime<Utc>,
    /// False once the pattern has been demoted.
    pub still_active: bool,
    /// Documents of the cluster at promotion time.
    #[serde(default)]
    pub cluster: BTreeSet<SolutionId>,
}

impl CriticalPattern {
    /// Returns true if this pattern references any of the given documents.
    #[must_use]
    pub fn claims_any<'a>(&self, ids: impl IntoIterator<Item = &'a SolutionId>) -> bool {
        ids.into_iter()
            .any(|id| *id == self.source_document_id || self.cluster.contains(id))
    }
}
