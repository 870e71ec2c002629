//! Planning-time retrieval.
//!
//! Ranks solution documents against a free-text query. Active critical
//! patterns matching the query always come first.
//!
//! # Ranking
//!
//! ```text
//! relevance = max(sim(query, title), sim(query, symptom), sim(query, fix))
//! score     = relevance × (1 + occurrence_weight × ln(1 + occurrences)
//!                          + recency_weight × 0.5^(age_days / half_life_days))
//! ```
//!
//! `sim` is the deduplication text similarity. A document must share at
//! least one token with the query to be considered at all.

use crate::models::{Category, CriticalPattern, SearchHit, SolutionDocument, SolutionId};
use crate::services::deduplication::{Fingerprint, SimilarityWeights};
use crate::storage::KnowledgeStore;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::instrument;

/// Seconds per day for age calculation.
const SECONDS_PER_DAY: f32 = 86_400.0;

/// Retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Weight of the logarithmic occurrence boost.
    pub occurrence_weight: f32,
    /// Weight of the recency boost.
    pub recency_weight: f32,
    /// Days after which the recency boost halves.
    pub half_life_days: f32,
    /// Result limit used when the caller does not pass one.
    pub default_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            occurrence_weight: 0.25,
            recency_weight: 0.25,
            half_life_days: 30.0,
            default_limit: 10,
        }
    }
}

/// Ranks solution documents for a query.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    config: RetrievalConfig,
    weights: SimilarityWeights,
}

impl Retriever {
    /// Creates a retriever scoring text with the given similarity weights.
    #[must_use]
    pub const fn new(config: RetrievalConfig, weights: SimilarityWeights) -> Self {
        Self { config, weights }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Searches the store.
    ///
    /// Returns at most `limit` hits: matching active patterns first, then
    /// ordinary documents by score descending (ties by ID ascending). A
    /// document never appears twice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the query is blank, or a store
    /// error if listing fails.
    #[instrument(skip(self, store), fields(operation = "search"))]
    pub fn search(
        &self,
        store: &dyn KnowledgeStore,
        query: &str,
        category: Option<Category>,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(Error::InvalidInput("search query is empty".to_string()));
        }
        let start = Instant::now();
        let query = Fingerprint::new(query);
        let now = Utc::now();

        let candidates = match category {
            Some(category) => store.list(category)?,
            None => store.all()?,
        };

        let mut pattern_hits = self.pattern_hits(store, &query, category, now)?;
        let claimed: BTreeSet<SolutionId> =
            pattern_hits.iter().map(|h| h.document.id.clone()).collect();

        let mut document_hits: Vec<SearchHit> = candidates
            .into_iter()
            .filter(|doc| !claimed.contains(&doc.id))
            .filter_map(|doc| {
                let relevance = self.relevance(&query, &doc)?;
                Some(SearchHit {
                    score: self.boosted(relevance, &doc, now),
                    document: doc,
                    pattern: None,
                })
            })
            .collect();

        pattern_hits.sort_by(rank);
        document_hits.sort_by(rank);
        let hits: Vec<SearchHit> = pattern_hits
            .into_iter()
            .chain(document_hits)
            .take(limit)
            .collect();

        metrics::counter!("compound_searches_total").increment(1);
        metrics::histogram!("compound_search_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::debug!(hits = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Hits for active patterns whose source document or statement matches.
    fn pattern_hits(
        &self,
        store: &dyn KnowledgeStore,
        query: &Fingerprint,
        category: Option<Category>,
        now: DateTime<Utc>,
    ) -> Result<Vec<SearchHit>> {
        let mut hits: Vec<SearchHit> = Vec::new();
        for pattern in store.active_patterns()? {
            if hits.iter().any(|h| h.document.id == pattern.source_document_id) {
                continue;
            }
            let Some(doc) = store.find(&pattern.source_document_id)? else {
                tracing::debug!(pattern_id = %pattern.pattern_id, "Pattern source document missing");
                continue;
            };
            if category.is_some_and(|c| c != doc.category) {
                continue;
            }
            let Some(relevance) = self.pattern_relevance(query, &pattern, &doc) else {
                continue;
            };
            hits.push(SearchHit {
                score: self.boosted(relevance, &doc, now),
                document: doc,
                pattern: Some(pattern),
            });
        }
        Ok(hits)
    }

    /// Best field similarity, or `None` without a shared token.
    fn relevance(&self, query: &Fingerprint, doc: &SolutionDocument) -> Option<f32> {
        let fields: Vec<Fingerprint> = doc
            .searchable_fields()
            .iter()
            .map(|f| Fingerprint::new(f))
            .collect();
        if !fields.iter().any(|f| query.shares_token(f)) {
            return None;
        }
        Some(
            fields
                .iter()
                .map(|f| self.weights.text(query, f))
                .fold(0.0, f32::max),
        )
    }

    fn pattern_relevance(
        &self,
        query: &Fingerprint,
        pattern: &CriticalPattern,
        doc: &SolutionDocument,
    ) -> Option<f32> {
        let statement = Fingerprint::new(&pattern.statement);
        let by_statement = query
            .shares_token(&statement)
            .then(|| self.weights.text(query, &statement));
        match (self.relevance(query, doc), by_statement) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }

    /// Applies the occurrence and recency boost.
    #[allow(clippy::cast_precision_loss)]
    fn boosted(&self, relevance: f32, doc: &SolutionDocument, now: DateTime<Utc>) -> f32 {
        let age_days = ((now - doc.updated_at).num_seconds().max(0) as f32) / SECONDS_PER_DAY;
        let occurrences = (1.0 + doc.occurrence_count as f32).ln();
        let recency = if self.config.half_life_days > 0.0 {
            0.5_f32.powf(age_days / self.config.half_life_days)
        } else {
            0.0
        };
        relevance
            * (1.0
                + self.config.occurrence_weight * occurrences
                + self.config.recency_weight * recency)
    }
}

/// Score descending, then ID ascending.
fn rank(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.document.id.cmp(&b.document.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Finding, PatternId};
    use crate::storage::{MemoryStore, PatternStore, SolutionStore};
    use chrono::Duration;

    fn store_doc(
        store: &MemoryStore,
        id: &str,
        category: Category,
        symptom: &str,
        fix: &str,
        count: u32,
    ) -> SolutionDocument {
        let finding = Finding::new("s-1", symptom, fix);
        let mut doc =
            SolutionDocument::from_finding(SolutionId::new(id), category, &finding, Utc::now());
        doc.occurrence_count = count;
        store.put(&doc).unwrap()
    }

    fn promote(store: &MemoryStore, source: &str, statement: &str) -> CriticalPattern {
        let pattern = CriticalPattern {
            pattern_id: PatternId::generate(),
            source_document_id: SolutionId::new(source),
            statement: statement.to_string(),
            promoted_at: Utc::now(),
            still_active: true,
            cluster: BTreeSet::from([SolutionId::new(source)]),
        };
        assert!(store.insert_pattern_if_unclaimed(&pattern).unwrap());
        pattern
    }

    #[test]
    fn test_requires_shared_token() {
        let store = MemoryStore::new();
        store_doc(&store, "ui-bug-a", Category::UiBug, "Modal overflows", "Wrap it", 1);

        let hits = Retriever::default()
            .search(&store, "database deadlock", None, 10)
            .unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_blank_query_is_invalid() {
        let store = MemoryStore::new();
        let err = Retriever::default().search(&store, "  ", None, 10).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_occurrences_boost_ranking() {
        let store = MemoryStore::new();
        store_doc(&store, "performance-issue-a", Category::PerformanceIssue, "Dashboard is slow", "Cache it", 1);
        store_doc(&store, "performance-issue-b", Category::PerformanceIssue, "Dashboard is slow", "Cache it", 5);

        let hits = Retriever::default()
            .search(&store, "slow dashboard", None, 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document.id.as_str(), "performance-issue-b");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_recency_boost() {
        let store = MemoryStore::new();
        let mut old = store_doc(&store, "performance-issue-a", Category::PerformanceIssue, "Dashboard is slow", "Cache it", 1);
        old.updated_at = Utc::now() - Duration::days(365);
        store.put(&old).unwrap();
        store_doc(&store, "performance-issue-b", Category::PerformanceIssue, "Dashboard is slow", "Cache it", 1);

        let hits = Retriever::default()
            .search(&store, "dashboard slow", None, 10)
            .unwrap();
        assert_eq!(hits[0].document.id.as_str(), "performance-issue-b");
    }

    #[test]
    fn test_equal_scores_order_by_id() {
        let store = MemoryStore::new();
        store_doc(&store, "database-issue-b", Category::DatabaseIssue, "Deadlock on orders", "Lock order", 1);
        store_doc(&store, "database-issue-a", Category::DatabaseIssue, "Deadlock on orders", "Lock order", 1);

        let hits = Retriever::default()
            .search(&store, "deadlock orders", None, 10)
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.document.id.as_str()).collect();
        assert_eq!(ids, vec!["database-issue-a", "database-issue-b"]);
    }

    #[test]
    fn test_patterns_first_without_duplicates() {
        let store = MemoryStore::new();
        store_doc(&store, "performance-issue-a", Category::PerformanceIssue, "Widget list query is slow", "Add an index", 1);
        store_doc(&store, "performance-issue-b", Category::PerformanceIssue, "Widget query slow", "Add an index on widgets", 9);
        promote(&store, "performance-issue-a", "Add an index");

        let hits = Retriever::default()
            .search(&store, "widget query slow", None, 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits[0].is_pattern());
        assert_eq!(hits[0].document.id.as_str(), "performance-issue-a");
        assert!(!hits[1].is_pattern());
    }

    #[test]
    fn test_demoted_patterns_rank_normally() {
        let store = MemoryStore::new();
        store_doc(&store, "performance-issue-a", Category::PerformanceIssue, "Widget query slow", "Add an index", 1);
        store_doc(&store, "performance-issue-b", Category::PerformanceIssue, "Widget query slow", "Add an index", 9);
        let pattern = promote(&store, "performance-issue-a", "Add an index");
        store.demote_pattern(&pattern.pattern_id).unwrap();

        let hits = Retriever::default()
            .search(&store, "widget query slow", None, 10)
            .unwrap();
        assert!(hits.iter().all(|h| !h.is_pattern()));
        assert_eq!(hits[0].document.id.as_str(), "performance-issue-b");
    }

    #[test]
    fn test_category_filter_applies_to_patterns() {
        let store = MemoryStore::new();
        store_doc(&store, "database-issue-a", Category::DatabaseIssue, "Slow orders query", "Add an index", 3);
        store_doc(&store, "performance-issue-b", Category::PerformanceIssue, "Slow orders page", "Cache it", 1);
        promote(&store, "database-issue-a", "Add an index");

        let hits = Retriever::default()
            .search(&store, "slow orders", Some(Category::PerformanceIssue), 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document.id.as_str(), "performance-issue-b");
    }

    #[test]
    fn test_pattern_matched_by_statement() {
        let store = MemoryStore::new();
        store_doc(&store, "database-issue-a", Category::DatabaseIssue, "Checkout hangs", "Reorder the updates", 3);
        promote(&store, "database-issue-a", "Always acquire row locks in id order");

        let hits = Retriever::default()
            .search(&store, "row locks", None, 10)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].is_pattern());
    }

    #[test]
    fn test_limit() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store_doc(&store, &format!("ui-bug-{i}"), Category::UiBug, "Modal overflows", "Wrap it", 1);
        }
        let hits = Retriever::default()
            .search(&store, "modal overflows", None, 3)
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert!(
            Retriever::default()
                .search(&store, "modal", None, 0)
                .unwrap()
                .is_empty()
        );
    }
}
