//! Solution documents and their identifiers.

use super::{Category, Finding, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Maximum title length in characters.
const MAX_TITLE_CHARS: usize = 80;

/// Content-derived identifier of a solution document.
///
/// Formatted as `{category}-{hash}`, so the category a document is filed
/// under can be recovered from the ID alone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SolutionId(String);

impl SolutionId {
    /// Creates a solution ID from a raw string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the category encoded in the ID prefix.
    #[must_use]
    pub fn category(&self) -> Option<Category> {
        let (prefix, hash) = self.0.rsplit_once('-')?;
        if hash.is_empty() {
            return None;
        }
        Category::all().iter().copied().find(|c| c.as_str() == prefix)
    }
}

impl fmt::Display for SolutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SolutionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SolutionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A durable, classified record of a solved problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionDocument {
    /// Content-derived identifier, stable for the document's lifetime.
    pub id: SolutionId,
    /// Taxonomy category.
    pub category: Category,
    /// Short human-readable title.
    pub title: String,
    /// The observed problem, as first recorded.
    pub symptom: String,
    /// Why it happened, as first recorded.
    pub root_cause: Option<String>,
    /// What resolved it, as first recorded.
    pub fix: String,
    /// When the document was first created.
    pub created_at: DateTime<Utc>,
    /// When the document last changed.
    pub updated_at: DateTime<Utc>,
    /// How many sessions reported this exact problem (always at least 1).
    pub occurrence_count: u32,
    /// Sessions that reported this problem.
    #[serde(default)]
    pub source_refs: BTreeSet<SessionId>,
    /// Near-duplicate documents linked to this one.
    #[serde(default)]
    pub cross_refs: BTreeSet<SolutionId>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Optimistic concurrency token, bumped by the store on every write.
    #[serde(default)]
    pub revision: u64,
}

impl SolutionDocument {
    /// Creates a first-occurrence document from a finding.
    ///
    /// The revision is left at 0; the store assigns it on insert.
    #[must_use]
    pub fn from_finding(
        id: SolutionId,
        category: Category,
        finding: &Finding,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            category,
            title: derive_title(&finding.symptom),
            symptom: finding.symptom.clone(),
            root_cause: finding.root_cause.clone(),
            fix: finding.fix.clone(),
            created_at: now,
            updated_at: now,
            occurrence_count: 1,
            source_refs: BTreeSet::from([finding.session_id.clone()]),
            cross_refs: BTreeSet::new(),
            tags: finding.keywords.iter().cloned().collect(),
            revision: 0,
        }
    }

    /// Records another occurrence from the given session.
    pub fn record_occurrence(&mut self, session: &SessionId, now: DateTime<Utc>) {
        self.occurrence_count = self.occurrence_count.saturating_add(1);
        self.source_refs.insert(session.clone());
        self.updated_at = now;
    }

    /// Returns the text used for relevance scoring.
    #[must_use]
    pub fn searchable_fields(&self) -> [&str; 3] {
        [self.title.as_str(), self.symptom.as_str(), self.fix.as_str()]
    }
}

/// Derives a title from a symptom: the first sentence, shortened at a word
/// boundary.
#[must_use]
pub fn derive_title(symptom: &str) -> String {
    let first_sentence = symptom
        .split_terminator(['.', '!', '?', '\n'])
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| symptom.trim());

    if first_sentence.chars().count() <= MAX_TITLE_CHARS {
        return first_sentence.to_string();
    }

    let mut title = String::new();
    for word in first_sentence.split_whitespace() {
        if title.chars().count() + word.chars().count() + 1 > MAX_TITLE_CHARS - 3 {
            break;
        }
        if !title.is_empty() {
            title.push(' ');
        }
        title.push_str(word);
    }
    if title.is_empty() {
        title = first_sentence.chars().take(MAX_TITLE_CHARS - 3).collect();
    }
    title.push_str("...");
    title
}
