//! End-to-end capture pipeline.
//!
//! Wires the extractor, classifier, deduplicator and promoter to one store,
//! and exposes the read side (search, patterns, clusters) to callers.
//!
//! Capturing never fails: a session that cannot be captured yields
//! [`CaptureOutcome::Skipped`] with a diagnostic note, so the invoking
//! workflow is never blocked by the knowledge engine.

use super::classifier::Classifier;
use super::deduplication::{Deduplicator, ReconcileKind};
use super::enforcement::render_required_reading;
use super::extraction::Extractor;
use super::promotion::Promoter;
use super::retrieval::Retriever;
use crate::config::CompoundConfig;
use crate::models::{
    Category, CriticalPattern, Extraction, Finding, PatternId, SearchHit, SolutionDocument,
    SolutionId, Transcript,
};
use crate::storage::{KnowledgeStore, MemoryStore, open_store};
use crate::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::instrument;

/// Result of capturing one session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CaptureOutcome {
    /// A finding was reconciled into the store.
    Captured {
        /// The document as stored.
        document: SolutionDocument,
        /// What reconciliation did.
        kind: ReconcileKind,
        /// The pattern promoted by this capture, if any.
        pattern: Option<CriticalPattern>,
    },
    /// The session had nothing actionable.
    NoFinding,
    /// The session could not be captured.
    Skipped {
        /// Diagnostic note.
        reason: String,
    },
}

impl CaptureOutcome {
    /// Returns the outcome as a metric label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Captured { .. } => "captured",
            Self::NoFinding => "no_finding",
            Self::Skipped { .. } => "skipped",
        }
    }

    /// Returns the stored document, if captured.
    #[must_use]
    pub const fn document(&self) -> Option<&SolutionDocument> {
        match self {
            Self::Captured { document, .. } => Some(document),
            _ => None,
        }
    }

    /// Returns the promoted pattern, if any.
    #[must_use]
    pub const fn pattern(&self) -> Option<&CriticalPattern> {
        match self {
            Self::Captured { pattern, .. } => pattern.as_ref(),
            _ => None,
        }
    }

    /// Returns true if a finding was captured.
    #[must_use]
    pub const fn is_captured(&self) -> bool {
        matches!(self, Self::Captured { .. })
    }
}

/// Store-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    /// Number of solution documents.
    pub documents: usize,
    /// Sum of all occurrence counts.
    pub occurrences: u64,
    /// Documents per category.
    pub by_category: BTreeMap<Category, usize>,
    /// Active critical patterns.
    pub active_patterns: usize,
    /// Demoted critical patterns.
    pub demoted_patterns: usize,
}

/// The compounding knowledge engine.
///
/// Cheap to clone; clones share the store.
#[derive(Clone)]
pub struct KnowledgeEngine {
    store: Arc<dyn KnowledgeStore>,
    extractor: Extractor,
    classifier: Classifier,
    deduplicator: Deduplicator,
    promoter: Promoter,
    retriever: Retriever,
    default_limit: usize,
}

impl std::fmt::Debug for KnowledgeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeEngine")
            .field("classifier", &self.classifier)
            .field("deduplicator", &self.deduplicator)
            .field("promoter", &self.promoter)
            .field("retriever", &self.retriever)
            .finish_non_exhaustive()
    }
}

impl KnowledgeEngine {
    /// Creates an engine over a store.
    #[must_use]
    pub fn new(store: Arc<dyn KnowledgeStore>, config: &CompoundConfig) -> Self {
        Self {
            store,
            extractor: Extractor::new(config.extraction.clone()),
            classifier: Classifier::new(config.classifier.clone()),
            deduplicator: Deduplicator::new(config.deduplication.clone()),
            promoter: Promoter::new(config.promotion.clone()),
            retriever: Retriever::new(config.retrieval.clone(), config.deduplication.weights()),
            default_limit: config.retrieval.default_limit,
        }
    }

    /// Creates an engine over a fresh in-memory store with default settings.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), &CompoundConfig::default())
    }

    /// Opens the configured store and creates an engine over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn from_config(config: &CompoundConfig) -> Result<Self> {
        let store = open_store(&config.storage)?;
        Ok(Self::new(store, config))
    }

    /// Returns the store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KnowledgeStore> {
        &self.store
    }

    /// Returns the classifier.
    #[must_use]
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Returns the configured default search limit.
    #[must_use]
    pub const fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Captures a session: extract, classify, reconcile, then evaluate
    /// promotion.
    #[instrument(skip(self, transcript), fields(operation = "capture", session = %transcript.session_id))]
    pub fn capture(&self, transcript: &Transcript) -> CaptureOutcome {
        let start = Instant::now();
        let outcome = match self.extractor.extract(transcript) {
            Ok(Extraction::Found(finding)) => self.capture_finding(&finding),
            Ok(Extraction::NoFinding) => {
                tracing::debug!("Nothing actionable in session");
                CaptureOutcome::NoFinding
            },
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed transcript");
                CaptureOutcome::Skipped {
                    reason: e.to_string(),
                }
            },
        };
        record_capture_metrics(&outcome, start);
        outcome
    }

    /// Captures an already extracted finding.
    #[instrument(skip(self, finding), fields(operation = "capture_finding", session = %finding.session_id))]
    pub fn capture_finding(&self, finding: &Finding) -> CaptureOutcome {
        let category = self.classifier.classify(finding);
        let reconciliation =
            match self
                .deduplicator
                .reconcile(finding, category, self.store.as_ref())
            {
                Ok(reconciliation) => reconciliation,
                Err(e) => {
                    tracing::warn!(error = %e, category = %category, "Skipping finding");
                    return CaptureOutcome::Skipped {
                        reason: e.to_string(),
                    };
                },
            };

        let pattern = match self
            .promoter
            .evaluate_for(self.store.as_ref(), &reconciliation.document.id)
        {
            Ok(pattern) => pattern,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    solution_id = %reconciliation.document.id,
                    "Promotion evaluation failed"
                );
                None
            },
        };

        tracing::info!(
            solution_id = %reconciliation.document.id,
            kind = reconciliation.kind.as_str(),
            occurrences = reconciliation.document.occurrence_count,
            promoted = pattern.is_some(),
            "Captured finding"
        );
        CaptureOutcome::Captured {
            document: reconciliation.document,
            kind: reconciliation.kind,
            pattern,
        }
    }

    /// Captures many sessions with at most `concurrency` in flight.
    ///
    /// Outcomes are returned in input order.
    pub async fn capture_batch(
        &self,
        transcripts: Vec<Transcript>,
        concurrency: usize,
    ) -> Vec<CaptureOutcome> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        let engine = Arc::new(self.clone());

        let mut handles = Vec::with_capacity(transcripts.len());
        for transcript in transcripts {
            let semaphore = Arc::clone(&semaphore);
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return CaptureOutcome::Skipped {
                        reason: "capture queue closed".to_string(),
                    };
                };
                tokio::task::spawn_blocking(move || engine.capture(&transcript))
                    .await
                    .unwrap_or_else(|e| CaptureOutcome::Skipped {
                        reason: format!("capture task failed: {e}"),
                    })
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await.unwrap_or_else(|e| CaptureOutcome::Skipped {
                reason: format!("capture task failed: {e}"),
            }));
        }
        outcomes
    }

    /// Searches the store; `None` uses the configured default limit.
    pub fn search(
        &self,
        query: &str,
        category: Option<Category>,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>> {
        self.retriever.search(
            self.store.as_ref(),
            query,
            category,
            limit.unwrap_or(self.default_limit),
        )
    }

    /// Retrieves a document.
    pub fn get(&self, id: &SolutionId) -> Result<SolutionDocument> {
        self.store.get(id)
    }

    /// Returns the cluster containing a document.
    pub fn cluster(&self, id: &SolutionId) -> Result<Vec<SolutionDocument>> {
        self.promoter.cluster_of(self.store.as_ref(), id)
    }

    /// Lists active critical patterns.
    pub fn active_patterns(&self) -> Result<Vec<CriticalPattern>> {
        self.promoter.active_patterns(self.store.as_ref())
    }

    /// Lists every critical pattern, including demoted ones.
    pub fn patterns(&self) -> Result<Vec<CriticalPattern>> {
        self.store.patterns()
    }

    /// Demotes a critical pattern.
    pub fn demote(&self, id: &PatternId) -> Result<CriticalPattern> {
        self.promoter.demote(self.store.as_ref(), id)
    }

    /// Renders the active patterns as a required-reading block.
    pub fn required_reading(&self) -> Result<String> {
        let patterns = self.active_patterns()?;
        render_required_reading(&patterns, self.store.as_ref())
    }

    /// Computes store-wide counters.
    pub fn stats(&self) -> Result<EngineStats> {
        let mut stats = EngineStats::default();
        for doc in self.store.all()? {
            stats.documents += 1;
            stats.occurrences += u64::from(doc.occurrence_count);
            *stats.by_category.entry(doc.category).or_default() += 1;
        }
        for pattern in self.store.patterns()? {
            if pattern.still_active {
                stats.active_patterns += 1;
            } else {
                stats.demoted_patterns += 1;
            }
        }
        Ok(stats)
    }
}

fn record_capture_metrics(outcome: &CaptureOutcome, start: Instant) {
    metrics::counter!("compound_captures_total", "outcome" => outcome.as_str()).increment(1);
    metrics::histogram!("compound_capture_duration_ms")
        .record(start.elapsed().as_secs_f64() * 1000.0);
}
