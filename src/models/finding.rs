//! Findings extracted from session transcripts.

use super::SessionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Role an excerpt played when a finding was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExcerptRole {
    /// The observed problem.
    Symptom,
    /// Why the problem happened.
    RootCause,
    /// What resolved it.
    Fix,
}

impl ExcerptRole {
    /// Returns the role as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Symptom => "symptom",
            Self::RootCause => "root_cause",
            Self::Fix => "fix",
        }
    }
}

impl fmt::Display for ExcerptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to the transcript excerpt a finding field was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcerptRef {
    /// Index of the source event in the transcript.
    pub event_index: usize,
    /// Which finding field the excerpt supports.
    pub role: ExcerptRole,
    /// The excerpt text as it appeared in the event.
    pub excerpt: String,
}

/// A structured problem/solution pair extracted from one session.
///
/// Findings are transient: they are classified and reconciled immediately
/// and never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Session the finding was extracted from.
    pub session_id: SessionId,
    /// The observed problem.
    pub symptom: String,
    /// Why it happened; `None` when unknown.
    pub root_cause: Option<String>,
    /// What resolved it.
    pub fix: String,
    /// Supporting excerpts, ordered by event index.
    pub evidence: Vec<ExcerptRef>,
    /// Optional category hint from the invoking user or agent.
    pub category_hint: Option<String>,
    /// Topic keywords, most frequent first.
    pub keywords: Vec<String>,
}

impl Finding {
    /// Creates a finding with no root cause, evidence, hint, or keywords.
    #[must_use]
    pub fn new(
        session_id: impl Into<SessionId>,
        symptom: impl Into<String>,
        fix: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            symptom: symptom.into(),
            root_cause: None,
            fix: fix.into(),
            evidence: Vec::new(),
            category_hint: None,
            keywords: Vec::new(),
        }
    }

    /// Sets the root cause.
    #[must_use]
    pub fn with_root_cause(mut self, root_cause: impl Into<String>) -> Self {
        self.root_cause = Some(root_cause.into());
        self
    }

    /// Sets the category hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.category_hint = Some(hint.into());
        self
    }

    /// Sets the keywords.
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of extraction.
///
/// A session with nothing actionable is a valid outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// An actionable symptom/fix pair was found.
    Found(Finding),
    /// No actionable symptom/fix pair was present.
    NoFinding,
}

impl Extraction {
    /// Returns the finding, if any.
    #[must_use]
    pub fn into_finding(self) -> Option<Finding> {
        match self {
            Self::Found(finding) => Some(finding),
            Self::NoFinding => None,
        }
    }

    /// Returns true if nothing actionable was found.
    #[must_use]
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::NoFinding)
    }
}
