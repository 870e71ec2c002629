//! Critical pattern promotion.
//!
//! Tracks recurrence across near-duplicate clusters and promotes clusters
//! whose combined occurrence count reaches the threshold into enforced
//! [`CriticalPattern`]s.
//!
//! # Lifecycle
//!
//! ```text
//! candidate ──(Σ occurrences ≥ threshold)──▶ promoted ──(demote)──▶ demoted
//! ```
//!
//! A cluster is the transitive closure of `cross_refs` from one document.
//! Promotion is guarded by [`PatternStore::insert_pattern_if_unclaimed`], so
//! re-evaluating a promoted cluster (or racing another evaluation of it)
//! never produces a second pattern. A demoted pattern keeps its claim.

use crate::models::{CriticalPattern, PatternId, SolutionDocument, SolutionId};
use crate::services::deduplication::ContentHasher;
use crate::services::extraction::patterns::strip_label;
use crate::storage::{KnowledgeStore, PatternStore, SolutionStore};
use crate::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Instant;
use tracing::instrument;

/// Lead-ins dropped before a fix becomes an imperative statement.
const LEAD_INS: &[&str] = &[
    "the fix was to ",
    "the fix is to ",
    "the solution was to ",
    "the solution is to ",
    "we fixed it by ",
    "we fixed this by ",
    "fixed it by ",
    "fixed this by ",
    "fixed by ",
    "resolved by ",
    "solved by ",
    "we decided to ",
    "decided to ",
    "we should ",
    "we will ",
    "we'll ",
    "we ",
    "i ",
    "by ",
];

/// Inflected leading verbs and their imperative forms.
const VERB_FORMS: &[(&str, &str)] = &[
    ("eager loading", "eager load"),
    ("eager-loading", "eager-load"),
    ("eager loaded", "eager load"),
    ("eager-loaded", "eager-load"),
    ("switched to", "switch to"),
    ("switching to", "switch to"),
    ("went with", "go with"),
    ("going with", "go with"),
    ("added", "add"),
    ("adding", "add"),
    ("used", "use"),
    ("using", "use"),
    ("switched", "switch"),
    ("switching", "switch"),
    ("replaced", "replace"),
    ("replacing", "replace"),
    ("changed", "change"),
    ("changing", "change"),
    ("updated", "update"),
    ("updating", "update"),
    ("upgraded", "upgrade"),
    ("upgrading", "upgrade"),
    ("pinned", "pin"),
    ("pinning", "pin"),
    ("removed", "remove"),
    ("removing", "remove"),
    ("wrapped", "wrap"),
    ("wrapping", "wrap"),
    ("enabled", "enable"),
    ("enabling", "enable"),
    ("disabled", "disable"),
    ("disabling", "disable"),
    ("moved", "move"),
    ("moving", "move"),
    ("renamed", "rename"),
    ("renaming", "rename"),
    ("setting", "set"),
    ("increased", "increase"),
    ("increasing", "increase"),
    ("decreased", "decrease"),
    ("decreasing", "decrease"),
    ("cached", "cache"),
    ("caching", "cache"),
    ("indexed", "index"),
    ("indexing", "index"),
    ("escaped", "escape"),
    ("escaping", "escape"),
    ("validated", "validate"),
    ("validating", "validate"),
    ("sanitized", "sanitize"),
    ("sanitizing", "sanitize"),
    ("retried", "retry"),
    ("retrying", "retry"),
    ("guarded", "guard"),
    ("guarding", "guard"),
    ("froze", "freeze"),
    ("freezing", "freeze"),
    ("chose", "choose"),
    ("choosing", "choose"),
    ("adopted", "adopt"),
    ("adopting", "adopt"),
];

/// Promotion configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionConfig {
    /// Cluster occurrence total at which a pattern is promoted.
    pub threshold: u32,
    /// Maximum statement length in characters.
    pub max_statement_chars: usize,
}

impl Default for PromotionConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            max_statement_chars: 200,
        }
    }
}

impl PromotionConfig {
    /// Sets the promotion threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold;
        self
    }
}

/// Promotes recurring solution clusters into critical patterns.
#[derive(Debug, Clone, Default)]
pub struct Promoter {
    config: PromotionConfig,
}

impl Promoter {
    /// Creates a promoter.
    #[must_use]
    pub const fn new(config: PromotionConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &PromotionConfig {
        &self.config
    }

    /// Returns the cluster containing a document, sorted by ID.
    ///
    /// Follows `cross_refs` transitively. Links to documents that no longer
    /// exist are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::NotFound`] if the starting document is missing.
    #[instrument(skip(self, store), fields(operation = "cluster_of", solution_id = %id))]
    pub fn cluster_of(
        &self,
        store: &dyn SolutionStore,
        id: &SolutionId,
    ) -> Result<Vec<SolutionDocument>> {
        let start = store.get(id)?;
        let mut visited = BTreeSet::from([start.id.clone()]);
        let mut queue = VecDeque::from([start]);
        let mut cluster = BTreeMap::new();

        while let Some(doc) = queue.pop_front() {
            for linked in &doc.cross_refs {
                if !visited.insert(linked.clone()) {
                    continue;
                }
                match store.find(linked)? {
                    Some(next) => queue.push_back(next),
                    None => tracing::debug!(solution_id = %linked, "Skipping dangling cross-reference"),
                }
            }
            cluster.insert(doc.id.clone(), doc);
        }

        Ok(cluster.into_values().collect())
    }

    /// Promotes a cluster if it has recurred often enough.
    ///
    /// Returns `None` when the total is below the threshold, when a pattern
    /// already claims the cluster, or when a concurrent evaluation won.
    #[instrument(skip(self, cluster, store), fields(operation = "evaluate", cluster_size = cluster.len()))]
    pub fn evaluate(
        &self,
        cluster: &[SolutionDocument],
        store: &dyn PatternStore,
    ) -> Result<Option<CriticalPattern>> {
        let start = Instant::now();
        let total: u64 = cluster.iter().map(|d| u64::from(d.occurrence_count)).sum();
        if total < u64::from(self.config.threshold) {
            tracing::debug!(total, threshold = self.config.threshold, "Cluster below threshold");
            return Ok(None);
        }

        let ids: BTreeSet<SolutionId> = cluster.iter().map(|d| d.id.clone()).collect();
        if store.patterns()?.iter().any(|p| p.claims_any(&ids)) {
            tracing::debug!(total, "Cluster already promoted");
            return Ok(None);
        }

        let Some(source) = source_document(cluster) else {
            return Ok(None);
        };
        let pattern = CriticalPattern {
            pattern_id: PatternId::generate(),
            source_document_id: source.id.clone(),
            statement: self.statement(cluster, source),
            promoted_at: Utc::now(),
            still_active: true,
            cluster: ids,
        };

        if !store.insert_pattern_if_unclaimed(&pattern)? {
            tracing::debug!(source = %source.id, "Lost promotion race");
            return Ok(None);
        }

        metrics::counter!("compound_promotions_total").increment(1);
        metrics::histogram!("compound_promotion_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);
        tracing::info!(
            pattern_id = %pattern.pattern_id,
            source = %pattern.source_document_id,
            total,
            "Promoted critical pattern"
        );
        Ok(Some(pattern))
    }

    /// Evaluates the cluster containing a document.
    pub fn evaluate_for(
        &self,
        store: &dyn KnowledgeStore,
        id: &SolutionId,
    ) -> Result<Option<CriticalPattern>> {
        let cluster = self.cluster_of(store, id)?;
        self.evaluate(&cluster, store)
    }

    /// Demotes a pattern.
    #[instrument(skip(self, store), fields(operation = "demote", pattern_id = %id))]
    pub fn demote(&self, store: &dyn PatternStore, id: &PatternId) -> Result<CriticalPattern> {
        let pattern = store.demote_pattern(id)?;
        metrics::counter!("compound_demotions_total").increment(1);
        tracing::info!(pattern_id = %id, "Demoted critical pattern");
        Ok(pattern)
    }

    /// Lists active patterns.
    pub fn active_patterns(&self, store: &dyn PatternStore) -> Result<Vec<CriticalPattern>> {
        store.active_patterns()
    }

    /// The cluster's most frequent fix, weighted by occurrence count and
    /// rewritten as an imperative.
    fn statement(&self, cluster: &[SolutionDocument], source: &SolutionDocument) -> String {
        let source_key = ContentHasher::normalize(&source.fix);
        let mut weights: BTreeMap<String, (u64, &str)> = BTreeMap::new();
        for doc in cluster {
            let entry = weights
                .entry(ContentHasher::normalize(&doc.fix))
                .or_insert((0, doc.fix.as_str()));
            entry.0 += u64::from(doc.occurrence_count);
        }

        let best = weights.values().map(|(w, _)| *w).max().unwrap_or(0);
        let fix = match weights.get(&source_key) {
            Some((w, _)) if *w == best => source.fix.as_str(),
            _ => weights
                .values()
                .find(|(w, _)| *w == best)
                .map_or(source.fix.as_str(), |(_, text)| *text),
        };

        truncate_chars(&imperative(fix), self.config.max_statement_chars)
    }
}

/// Highest occurrence count; ties go to the earliest created, then the
/// smallest ID.
fn source_document(cluster: &[SolutionDocument]) -> Option<&SolutionDocument> {
    cluster
        .iter()
        .max_by_key(|d| (d.occurrence_count, Reverse(d.created_at), Reverse(d.id.clone())))
}

/// Rewrites a fix description as an imperative rule.
///
/// `"Fixed by adding an index."` becomes `"Add an index"`.
#[must_use]
pub fn imperative(fix: &str) -> String {
    let mut text = strip_label(fix).trim();
    while let Some(lead) = LEAD_INS.iter().find(|lead| starts_with_ignore_case(text, lead)) {
        text = text[lead.len()..].trim_start();
    }

    let rewritten = VERB_FORMS
        .iter()
        .find(|(form, _)| {
            starts_with_ignore_case(text, form)
                && text[form.len()..]
                    .chars()
                    .next()
                    .is_none_or(|c| !c.is_alphanumeric())
        })
        .map_or_else(
            || text.to_string(),
            |(form, base)| format!("{base}{}", &text[form.len()..]),
        );

    let trimmed = rewritten
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', ';', ','])
        .to_string();

    let mut chars = trimmed.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Caps text at `max` characters, cutting at a word boundary when possible.
fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let budget = max.saturating_sub(3);
    let head: String = text.chars().take(budget).collect();
    let cut = head
        .rfind(' ')
        .filter(|i| *i > 0)
        .map_or(head.as_str(), |i| &head[..i]);
    format!("{}...", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Finding};
    use crate::storage::MemoryStore;
    use chrono::Duration;
    use test_case::test_case;

    fn doc(id: &str, fix: &str, count: u32) -> SolutionDocument {
        let finding = Finding::new("s-1", format!("symptom of {id}"), fix);
        let mut doc = SolutionDocument::from_finding(
            SolutionId::new(id),
            Category::PerformanceIssue,
            &finding,
            Utc::now(),
        );
        doc.occurrence_count = count;
        doc
    }

    fn link(store: &MemoryStore, a: &str, b: &str) {
        for (from, to) in [(a, b), (b, a)] {
            let mut d = store.get(&SolutionId::new(from)).unwrap();
            d.cross_refs.insert(SolutionId::new(to));
            store.put(&d).unwrap();
        }
    }

    #[test_case("Fixed by adding an index." => "Add an index"; "fixed by gerund")]
    #[test_case("Fix: eager loading widgets with includes" => "Eager load widgets with includes"; "label and two word verb")]
    #[test_case("We switched to a connection pool" => "Switch to a connection pool"; "subject and past tense")]
    #[test_case("The fix was to pin the gem version" => "Pin the gem version"; "the fix was to")]
    #[test_case("use bound parameters" => "Use bound parameters"; "already imperative")]
    #[test_case("Setup the cache" => "Setup the cache"; "verb prefix needs a word boundary")]
    fn test_imperative(fix: &str) -> String {
        imperative(fix)
    }

    #[test]
    fn test_truncate_chars() {
        let text = "word ".repeat(100);
        let capped = truncate_chars(text.trim(), 200);
        assert!(capped.chars().count() <= 200);
        assert!(capped.ends_with("..."));
        assert_eq!(truncate_chars("short", 200), "short");
    }

    #[test]
    fn test_cluster_of_follows_links_transitively() {
        let store = MemoryStore::new();
        for id in ["performance-issue-a", "performance-issue-b", "performance-issue-c", "performance-issue-d"] {
            store.put(&doc(id, "fix", 1)).unwrap();
        }
        link(&store, "performance-issue-a", "performance-issue-b");
        link(&store, "performance-issue-b", "performance-issue-c");

        let promoter = Promoter::default();
        let cluster = promoter
            .cluster_of(&store, &SolutionId::new("performance-issue-c"))
            .unwrap();
        let ids: Vec<&str> = cluster.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["performance-issue-a", "performance-issue-b", "performance-issue-c"]);
    }

    #[test]
    fn test_cluster_of_skips_dangling_refs() {
        let store = MemoryStore::new();
        let mut a = doc("performance-issue-a", "fix", 1);
        a.cross_refs.insert(SolutionId::new("performance-issue-gone"));
        store.put(&a).unwrap();

        let cluster = Promoter::default()
            .cluster_of(&store, &SolutionId::new("performance-issue-a"))
            .unwrap();
        assert_eq!(cluster.len(), 1);
    }

    #[test]
    fn test_cluster_of_missing_start() {
        let store = MemoryStore::new();
        let err = Promoter::default()
            .cluster_of(&store, &SolutionId::new("performance-issue-none"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_threshold() {
        let store = MemoryStore::new();
        let promoter = Promoter::default();

        let below = vec![doc("performance-issue-a", "Add an index", 2)];
        assert!(promoter.evaluate(&below, &store).unwrap().is_none());

        let at = vec![
            doc("performance-issue-a", "Add an index", 2),
            doc("performance-issue-b", "Add an index", 1),
        ];
        let pattern = promoter.evaluate(&at, &store).unwrap().unwrap();
        assert_eq!(pattern.source_document_id, SolutionId::new("performance-issue-a"));
        assert_eq!(pattern.statement, "Add an index");
        assert!(pattern.still_active);
        assert_eq!(pattern.cluster.len(), 2);
        assert_eq!(store.patterns().unwrap().len(), 1);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let store = MemoryStore::new();
        let promoter = Promoter::default();
        let cluster = vec![doc("performance-issue-a", "Add an index", 3)];

        assert!(promoter.evaluate(&cluster, &store).unwrap().is_some());
        assert!(promoter.evaluate(&cluster, &store).unwrap().is_none());
        assert_eq!(store.patterns().unwrap().len(), 1);
    }

    #[test]
    fn test_demoted_pattern_still_claims_cluster() {
        let store = MemoryStore::new();
        let promoter = Promoter::default();
        let cluster = vec![doc("performance-issue-a", "Add an index", 3)];

        let pattern = promoter.evaluate(&cluster, &store).unwrap().unwrap();
        let demoted = promoter.demote(&store, &pattern.pattern_id).unwrap();
        assert!(!demoted.still_active);
        assert!(promoter.active_patterns(&store).unwrap().is_empty());

        assert!(promoter.evaluate(&cluster, &store).unwrap().is_none());
    }

    #[test]
    fn test_source_ties_prefer_earliest_then_smallest_id() {
        let now = Utc::now();
        let mut a = doc("performance-issue-b", "x", 2);
        let mut b = doc("performance-issue-a", "x", 2);
        a.created_at = now - Duration::days(1);
        b.created_at = now;
        let cluster = [a.clone(), b.clone()];
        assert_eq!(source_document(&cluster).unwrap().id, a.id);

        b.created_at = a.created_at;
        let cluster = [a, b.clone()];
        assert_eq!(source_document(&cluster).unwrap().id, b.id);
    }

    #[test]
    fn test_statement_uses_most_frequent_fix() {
        let promoter = Promoter::default();
        let source = doc("performance-issue-a", "Cache the query", 2);
        let cluster = vec![
            source.clone(),
            doc("performance-issue-b", "Added an index.", 1),
            doc("performance-issue-c", "added an index", 2),
        ];
        assert_eq!(promoter.statement(&cluster, &source), "Add an index");
    }

    #[test]
    fn test_statement_ties_go_to_source_fix() {
        let promoter = Promoter::default();
        let source = doc("performance-issue-b", "Cache the query", 2);
        let cluster = vec![doc("performance-issue-a", "Add an index", 2), source.clone()];
        assert_eq!(promoter.statement(&cluster, &source), "Cache the query");
    }

    #[test]
    fn test_evaluate_for_uses_whole_cluster() {
        let store = MemoryStore::new();
        store.put(&doc("performance-issue-a", "Add an index", 2)).unwrap();
        store.put(&doc("performance-issue-b", "Add an index", 1)).unwrap();
        let promoter = Promoter::default();

        assert!(
            promoter
                .evaluate_for(&store, &SolutionId::new("performance-issue-a"))
                .unwrap()
                .is_none()
        );

        link(&store, "performance-issue-a", "performance-issue-b");
        let pattern = promoter
            .evaluate_for(&store, &SolutionId::new("performance-issue-b"))
            .unwrap()
            .unwrap();
        assert_eq!(pattern.source_document_id, SolutionId::new("performance-issue-a"));
    }
}
