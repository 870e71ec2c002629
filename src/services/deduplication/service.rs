//! Deduplicator: reconciles findings against the store.
//!
//! Reconciliation runs in two tiers:
//! 1. **Exact match**: content-addressed ID lookup, incrementing the document
//! 2. **Near duplicate**: lexical similarity over same-category documents,
//!    creating a cross-linked document
//!
//! Every write is a compare-and-swap on the document revision; conflicts are
//! retried from a fresh read.

use crate::models::{Category, Finding, SolutionDocument, SolutionId};
use crate::storage::SolutionStore;
use crate::{Error, Result};
use chrono::Utc;
use std::cmp::Ordering;
use std::time::Instant;
use tracing::instrument;

use super::config::DeduplicationConfig;
use super::hasher::ContentHasher;
use super::similarity::PairFingerprint;
use super::types::{ReconcileKind, Reconciliation};

/// Reconciles findings against stored solution documents.
///
/// Stateless apart from its configuration; safe to share across threads.
///
/// # Example
///
/// ```rust
/// use compound::models::Finding;
/// use compound::services::deduplication::{DeduplicationConfig, ReconcileKind};
/// use compound::storage::MemoryStore;
/// use compound::{Category, Deduplicator};
///
/// let store = MemoryStore::new();
/// let dedup = Deduplicator::new(DeduplicationConfig::default());
/// let finding = Finding::new("s-1", "Login returns 500", "Handle the nil session");
///
/// let first = dedup.reconcile(&finding, Category::RuntimeError, &store)?;
/// assert_eq!(first.kind, ReconcileKind::Created);
///
/// let second = dedup.reconcile(&finding, Category::RuntimeError, &store)?;
/// assert_eq!(second.kind, ReconcileKind::Incremented);
/// assert_eq!(second.document.occurrence_count, 2);
/// # Ok::<(), compound::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Deduplicator {
    config: DeduplicationConfig,
}

impl Deduplicator {
    /// Creates a deduplicator.
    #[must_use]
    pub const fn new(config: DeduplicationConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &DeduplicationConfig {
        &self.config
    }

    /// Reconciles a finding of the given category against the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentUpdateConflict`] once the retry budget is
    /// exhausted, or any store error.
    #[instrument(
        skip(self, finding, store),
        fields(
            operation = "reconcile",
            session = %finding.session_id,
            category = %category
        )
    )]
    pub fn reconcile(
        &self,
        finding: &Finding,
        category: Category,
        store: &dyn SolutionStore,
    ) -> Result<Reconciliation> {
        let start = Instant::now();
        let id = ContentHasher::solution_id(category, &finding.symptom);

        let reconciliation =
            self.with_retries(&id, || self.try_reconcile(&id, finding, category, store))?;

        if let ReconcileKind::NearDuplicate { matched, .. } = &reconciliation.kind {
            self.backlink(matched, &id, store)?;
        }

        tracing::info!(
            solution_id = %reconciliation.document.id,
            kind = reconciliation.kind.as_str(),
            occurrence_count = reconciliation.document.occurrence_count,
            "Reconciled finding"
        );
        metrics::counter!(
            "compound_reconcile_total",
            "kind" => reconciliation.kind.as_str()
        )
        .increment(1);
        metrics::histogram!("compound_reconcile_duration_ms")
            .record(start.elapsed().as_secs_f64() * 1000.0);

        Ok(reconciliation)
    }

    /// Runs `attempt` until it stops losing compare-and-swaps.
    fn with_retries<T>(&self, id: &SolutionId, mut attempt: impl FnMut() -> Result<T>) -> Result<T> {
        let mut retries = 0;
        loop {
            match attempt() {
                Err(e) if e.is_conflict() && retries < self.config.max_retries => {
                    retries += 1;
                    tracing::debug!(solution_id = %id, retries, "Compare-and-swap conflict, retrying");
                    metrics::counter!("compound_dedup_conflicts_total").increment(1);
                },
                Err(e) if e.is_conflict() => {
                    tracing::warn!(solution_id = %id, retries, "Conflict retries exhausted");
                    return Err(Error::ConcurrentUpdateConflict { id: id.to_string() });
                },
                other => return other,
            }
        }
    }

    /// One read-decide-write pass.
    fn try_reconcile(
        &self,
        id: &SolutionId,
        finding: &Finding,
        category: Category,
        store: &dyn SolutionStore,
    ) -> Result<Reconciliation> {
        let now = Utc::now();

        if let Some(mut existing) = store.find(id)? {
            let expected = existing.revision;
            existing.record_occurrence(&finding.session_id, now);
            let document = store.compare_and_put(&existing, Some(expected))?;
            return Ok(Reconciliation {
                document,
                kind: ReconcileKind::Incremented,
            });
        }

        let mut doc = SolutionDocument::from_finding(id.clone(), category, finding, now);
        let kind = match self.best_match(finding, category, store)? {
            Some((matched, score)) => {
                doc.cross_refs.insert(matched.clone());
                ReconcileKind::NearDuplicate { matched, score }
            },
            None => ReconcileKind::Created,
        };

        let document = store.compare_and_put(&doc, None)?;
        Ok(Reconciliation { document, kind })
    }

    /// Finds the most similar same-category document above the threshold.
    ///
    /// Compares against at most `max_comparison_set` documents, most
    /// recently updated first. Ties go to the smallest ID.
    fn best_match(
        &self,
        finding: &Finding,
        category: Category,
        store: &dyn SolutionStore,
    ) -> Result<Option<(SolutionId, f32)>> {
        let mut candidates = store.list(category)?;
        candidates.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        candidates.truncate(self.config.max_comparison_set);

        let weights = self.config.weights();
        let probe = PairFingerprint::new(&finding.symptom, &finding.fix);

        let best = candidates
            .iter()
            .map(|doc| {
                let score = weights.pair(&probe, &PairFingerprint::new(&doc.symptom, &doc.fix));
                (&doc.id, score)
            })
            .filter(|(_, score)| *score > self.config.similarity_threshold)
            .max_by(|(id_a, a), (id_b, b)| {
                a.partial_cmp(b)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| id_b.cmp(id_a))
            });

        if let Some((id, score)) = best {
            tracing::debug!(matched = %id, score, "Near-duplicate candidate");
        }
        Ok(best.map(|(id, score)| (id.clone(), score)))
    }

    /// Adds `new_id` to the cross references of `matched`.
    ///
    /// A matched document that no longer exists is skipped.
    fn backlink(
        &self,
        matched: &SolutionId,
        new_id: &SolutionId,
        store: &dyn SolutionStore,
    ) -> Result<()> {
        self.with_retries(matched, || {
            let Some(mut doc) = store.find(matched)? else {
                tracing::warn!(matched = %matched, "Matched document vanished, skipping backlink");
                return Ok(());
            };
            if !doc.cross_refs.insert(new_id.clone()) {
                return Ok(());
            }
            let expected = doc.revision;
            doc.updated_at = Utc::now();
            store.compare_and_put(&doc, Some(expected)).map(|_| ())
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::models::SessionId;
    use crate::storage::MemoryStore;

    fn finding(session: &str, symptom: &str, fix: &str) -> Finding {
        Finding::new(session, symptom, fix)
    }

    #[test]
    fn test_first_finding_creates_document() {
        let store = MemoryStore::new();
        let dedup = Deduplicator::default();

        let result = dedup
            .reconcile(
                &finding("s-1", "Login returns 500", "Handle nil session"),
                Category::RuntimeError,
                &store,
            )
            .unwrap();

        assert_eq!(result.kind, ReconcileKind::Created);
        assert_eq!(result.document.occurrence_count, 1);
        assert_eq!(result.document.revision, 1);
        assert!(result.document.cross_refs.is_empty());
        assert_eq!(
            result.document.id,
            ContentHasher::solution_id(Category::RuntimeError, "Login returns 500")
        );
    }

    #[test]
    fn test_identical_findings_increment() {
        let store = MemoryStore::new();
        let dedup = Deduplicator::default();

        let first = dedup
            .reconcile(
                &finding("s-1", "Login returns 500", "Handle nil session"),
                Category::RuntimeError,
                &store,
            )
            .unwrap();
        let second = dedup
            .reconcile(
                &finding("s-2", "login returns 500!", "Something else entirely"),
                Category::RuntimeError,
                &store,
            )
            .unwrap();

        assert_eq!(second.kind, ReconcileKind::Incremented);
        assert_eq!(second.document.id, first.document.id);
        assert_eq!(second.document.occurrence_count, 2);
        assert_eq!(second.document.fix, "Handle nil session");
        assert!(second.document.source_refs.contains(&SessionId::new("s-2")));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_near_duplicate_links_both_ways() {
        let store = MemoryStore::new();
        let dedup = Deduplicator::default();

        let first = dedup
            .reconcile(
                &finding(
                    "s-1",
                    "Dashboard widget query is slow",
                    "Eager load widgets with includes",
                ),
                Category::PerformanceIssue,
                &store,
            )
            .unwrap();
        let second = dedup
            .reconcile(
                &finding(
                    "s-2",
                    "Dashboard widget queries are slow",
                    "Eager load widgets with includes",
                ),
                Category::PerformanceIssue,
                &store,
            )
            .unwrap();

        let ReconcileKind::NearDuplicate { matched, score } = &second.kind else {
            panic!("expected near duplicate, got {:?}", second.kind);
        };
        assert_eq!(matched, &first.document.id);
        assert!(*score > 0.55);
        assert_eq!(second.document.occurrence_count, 1);
        assert!(second.document.cross_refs.contains(&first.document.id));

        let backlinked = store.get(&first.document.id).unwrap();
        assert!(backlinked.cross_refs.contains(&second.document.id));
        assert_eq!(backlinked.occurrence_count, 1);
    }

    #[test]
    fn test_other_categories_are_not_compared() {
        let store = MemoryStore::new();
        let dedup = Deduplicator::default();

        dedup
            .reconcile(
                &finding("s-1", "Dashboard widget query is slow", "Eager load widgets"),
                Category::PerformanceIssue,
                &store,
            )
            .unwrap();
        let other = dedup
            .reconcile(
                &finding("s-2", "Dashboard widget queries are slow", "Eager load widgets"),
                Category::DatabaseIssue,
                &store,
            )
            .unwrap();

        assert_eq!(other.kind, ReconcileKind::Created);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let store = MemoryStore::new();
        let dedup = Deduplicator::new(DeduplicationConfig::default().with_similarity_threshold(1.0));
        dedup
            .reconcile(&finding("s-1", "Build fails", "Pin the toolchain"), Category::BuildError, &store)
            .unwrap();
        let again = dedup
            .reconcile(&finding("s-2", "Build fails!!", "Pin the toolchain"), Category::BuildError, &store)
            .unwrap();
        assert_eq!(again.kind, ReconcileKind::Incremented);

        let different = dedup
            .reconcile(&finding("s-3", "Build fails badly", "Pin the toolchain"), Category::BuildError, &store)
            .unwrap();
        assert_eq!(different.kind, ReconcileKind::Created);
    }

    #[test]
    fn test_comparison_set_cap() {
        let store = MemoryStore::new();
        let dedup = Deduplicator::new(DeduplicationConfig::default().with_max_comparison_set(0));
        dedup
            .reconcile(&finding("s-1", "Dashboard widget query is slow", "Eager load widgets"), Category::PerformanceIssue, &store)
            .unwrap();
        let second = dedup
            .reconcile(&finding("s-2", "Dashboard widget queries are slow", "Eager load widgets"), Category::PerformanceIssue, &store)
            .unwrap();
        assert_eq!(second.kind, ReconcileKind::Created);
    }

    /// Store whose compare-and-swap always loses.
    struct AlwaysConflicting(MemoryStore);

    impl SolutionStore for AlwaysConflicting {
        fn get(&self, id: &SolutionId) -> Result<SolutionDocument> {
            self.0.get(id)
        }
        fn put(&self, doc: &SolutionDocument) -> Result<SolutionDocument> {
            self.0.put(doc)
        }
        fn compare_and_put(&self, doc: &SolutionDocument, _: Option<u64>) -> Result<SolutionDocument> {
            Err(Error::ConcurrentUpdateConflict { id: doc.id.to_string() })
        }
        fn list(&self, category: Category) -> Result<Vec<SolutionDocument>> {
            self.0.list(category)
        }
        fn all(&self) -> Result<Vec<SolutionDocument>> {
            self.0.all()
        }
    }

    #[test]
    fn test_exhausted_retries_surface_conflict() {
        let store = AlwaysConflicting(MemoryStore::new());
        let dedup = Deduplicator::new(DeduplicationConfig::default().with_max_retries(2));
        let err = dedup
            .reconcile(&finding("s-1", "Flaky test", "Seed the RNG"), Category::TestFailure, &store)
            .unwrap_err();
        assert!(err.is_conflict());
    }
}
