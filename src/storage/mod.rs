//! Storage layer abstraction.
//!
//! The store is the single source of truth for solution documents and
//! critical patterns. Three interchangeable backends are provided:
//! - **Memory**: volatile, for tests and embedding
//! - **Filesystem**: Markdown with YAML front matter, one file per document
//! - **`SQLite`**: a single database file with WAL journaling
//!
//! Every backend honours the same concurrency contract: writes bump a
//! per-document `revision`, compare-and-swap rejects stale writers, and
//! pattern insertion is guarded atomically against clusters that already
//! have a pattern.

// Allow significant_drop_tightening - guards are held for the full
// read-modify-write on purpose.
#![allow(clippy::significant_drop_tightening)]

pub mod persistence;
pub mod traits;

pub use persistence::{FilesystemStore, MemoryStore, SqliteStore};
pub use traits::{KnowledgeStore, PatternStore, SolutionStore};

pub(crate) use traits::{pattern_not_found, solution_conflict, solution_not_found};

use crate::config::{StorageBackend, StorageConfig};
use crate::models::{CriticalPattern, SolutionId};
use crate::{Error, Result};
use std::sync::Arc;

/// Opens the store selected by the configuration.
///
/// # Errors
///
/// Returns an error if the data directory or database cannot be created.
pub fn open_store(config: &StorageConfig) -> Result<Arc<dyn KnowledgeStore>> {
    let store: Arc<dyn KnowledgeStore> = match config.backend {
        StorageBackend::Memory => Arc::new(MemoryStore::new()),
        StorageBackend::Filesystem => {
            Arc::new(FilesystemStore::with_create(config.resolved_data_dir())?)
        },
        StorageBackend::Sqlite => {
            let dir = config.resolved_data_dir();
            std::fs::create_dir_all(&dir).map_err(|e| Error::operation("create_data_dir", e))?;
            Arc::new(SqliteStore::new(dir.join(SqliteStore::DEFAULT_FILE_NAME))?)
        },
    };
    tracing::debug!(backend = config.backend.as_str(), "Opened knowledge store");
    Ok(store)
}

/// Computes the revision a compare-and-swap write should store.
///
/// `current` is the stored revision (`None` if the document is absent) and
/// `expected` the revision the writer last read.
pub(crate) fn next_revision(
    id: &SolutionId,
    current: Option<u64>,
    expected: Option<u64>,
) -> Result<u64> {
    match (current, expected) {
        (None, None) => Ok(1),
        (Some(cur), Some(exp)) if cur == exp => Ok(cur + 1),
        _ => Err(solution_conflict(id)),
    }
}

/// Returns true if any existing pattern references a document of the
/// candidate's cluster or its source document.
pub(crate) fn is_claimed<'a>(
    existing: impl IntoIterator<Item = &'a CriticalPattern>,
    candidate: &CriticalPattern,
) -> bool {
    existing.into_iter().any(|p| {
        p.claims_any(
            candidate
                .cluster
                .iter()
                .chain(std::iter::once(&candidate.source_document_id)),
        )
    })
}
