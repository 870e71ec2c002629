//! Reconciliation result types.

use crate::models::{SolutionDocument, SolutionId};
use serde::Serialize;

/// What reconciling a finding did to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconcileKind {
    /// An existing document with the same content address was incremented.
    Incremented,
    /// A new document was created and cross-linked to a similar one.
    NearDuplicate {
        /// The similar document the new one links to.
        matched: SolutionId,
        /// The similarity score of the match.
        score: f32,
    },
    /// A new, unlinked document was created.
    Created,
}

impl ReconcileKind {
    /// Returns the kind as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Incremented => "incremented",
            Self::NearDuplicate { .. } => "near_duplicate",
            Self::Created => "created",
        }
    }

    /// Returns true if a new document was written.
    #[must_use]
    pub const fn is_new_document(&self) -> bool {
        !matches!(self, Self::Incremented)
    }
}

/// Result of reconciling a finding.
///
/// # Example
///
/// ```rust
/// use compound::services::deduplication::ReconcileKind;
///
/// assert_eq!(ReconcileKind::Created.as_str(), "created");
/// assert!(!ReconcileKind::Incremented.is_new_document());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reconciliation {
    /// The document as stored after reconciliation.
    pub document: SolutionDocument,
    /// What happened.
    #[serde(flatten)]
    pub kind: ReconcileKind,
}
