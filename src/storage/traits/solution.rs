//! Solution document store trait.

use crate::models::{Category, SolutionDocument, SolutionId};
use crate::{Error, Result};

/// Trait for solution document storage.
///
/// Backends are the authoritative source of truth for solution documents.
/// Every write bumps the document's `revision`; read-modify-write callers
/// use [`SolutionStore::compare_and_put`] so that concurrent increments on
/// the same ID are never lost.
pub trait SolutionStore: Send + Sync {
    /// Retrieves a document by ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no document has this ID.
    fn get(&self, id: &SolutionId) -> Result<SolutionDocument>;

    /// Inserts or replaces a document (last writer wins).
    ///
    /// Returns the document as stored, with its new revision.
    fn put(&self, doc: &SolutionDocument) -> Result<SolutionDocument>;

    /// Writes a document only if the stored revision matches `expected`.
    ///
    /// `None` means the document must not exist yet (insert-only).
    /// Returns the document as stored, with its new revision.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConcurrentUpdateConflict`] if the stored revision
    /// differs from `expected`.
    fn compare_and_put(
        &self,
        doc: &SolutionDocument,
        expected: Option<u64>,
    ) -> Result<SolutionDocument>;

    /// Lists documents in a category, sorted by ID.
    fn list(&self, category: Category) -> Result<Vec<SolutionDocument>>;

    /// Lists every document, sorted by ID.
    fn all(&self) -> Result<Vec<SolutionDocument>>;

    /// Retrieves a document, mapping a miss to `None`.
    fn find(&self, id: &SolutionId) -> Result<Option<SolutionDocument>> {
        match self.get(id) {
            Ok(doc) => Ok(Some(doc)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns the total count of documents.
    fn count(&self) -> Result<usize> {
        Ok(self.all()?.len())
    }
}

/// Builds the not-found error for a solution ID.
pub(crate) fn solution_not_found(id: &SolutionId) -> Error {
    Error::NotFound {
        kind: "solution",
        id: id.to_string(),
    }
}

/// Builds the conflict error for a solution ID.
pub(crate) fn solution_conflict(id: &SolutionId) -> Error {
    Error::ConcurrentUpdateConflict { id: id.to_string() }
}
