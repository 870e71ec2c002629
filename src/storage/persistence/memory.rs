//! In-memory knowledge store.
//!
//! Useful for tests, benchmarks, and embedding the engine without any
//! durable state.

use crate::models::{Category, CriticalPattern, PatternId, SolutionDocument, SolutionId};
use crate::storage::traits::{PatternStore, SolutionStore};
use crate::storage::{is_claimed, next_revision, pattern_not_found, solution_not_found};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory store guarded by locks.
///
/// A single write lock covers each compare-and-swap, which gives the
/// per-ID atomicity the deduplicator relies on.
#[derive(Debug, Default)]
pub struct MemoryStore {
    solutions: RwLock<HashMap<SolutionId, SolutionDocument>>,
    patterns: Mutex<BTreeMap<PatternId, CriticalPattern>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<SolutionId, SolutionDocument>>> {
        self.solutions.read().map_err(|_| lock_poisoned("read_solutions"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<SolutionId, SolutionDocument>>> {
        self.solutions
            .write()
            .map_err(|_| lock_poisoned("write_solutions"))
    }

    fn pattern_guard(&self) -> Result<MutexGuard<'_, BTreeMap<PatternId, CriticalPattern>>> {
        self.patterns.lock().map_err(|_| lock_poisoned("lock_patterns"))
    }
}

fn lock_poisoned(operation: &str) -> Error {
    Error::operation(operation, "Lock poisoned")
}

fn sorted(mut docs: Vec<SolutionDocument>) -> Vec<SolutionDocument> {
    docs.sort_by(|a, b| a.id.cmp(&b.id));
    docs
}

impl SolutionStore for MemoryStore {
    fn get(&self, id: &SolutionId) -> Result<SolutionDocument> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| solution_not_found(id))
    }

    fn put(&self, doc: &SolutionDocument) -> Result<SolutionDocument> {
        let mut guard = self.write()?;
        let revision = guard.get(&doc.id).map_or(1, |current| current.revision + 1);
        let mut stored = doc.clone();
        stored.revision = revision;
        guard.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn compare_and_put(
        &self,
        doc: &SolutionDocument,
        expected: Option<u64>,
    ) -> Result<SolutionDocument> {
        let mut guard = self.write()?;
        let current = guard.get(&doc.id).map(|d| d.revision);
        let revision = next_revision(&doc.id, current, expected)?;
        let mut stored = doc.clone();
        stored.revision = revision;
        guard.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    fn list(&self, category: Category) -> Result<Vec<SolutionDocument>> {
        let docs = self
            .read()?
            .values()
            .filter(|d| d.category == category)
            .cloned()
            .collect();
        Ok(sorted(docs))
    }

    fn all(&self) -> Result<Vec<SolutionDocument>> {
        Ok(sorted(self.read()?.values().cloned().collect()))
    }

    fn count(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }
}

impl PatternStore for MemoryStore {
    fn get_pattern(&self, id: &PatternId) -> Result<CriticalPattern> {
        self.pattern_guard()?
            .get(id)
            .cloned()
            .ok_or_else(|| pattern_not_found(id))
    }

    fn patterns(&self) -> Result<Vec<CriticalPattern>> {
        Ok(self.pattern_guard()?.values().cloned().collect())
    }

    fn insert_pattern_if_unclaimed(&self, pattern: &CriticalPattern) -> Result<bool> {
        let mut guard = self.pattern_guard()?;
        if is_claimed(guard.values(), pattern) {
            return Ok(false);
        }
        guard.insert(pattern.pattern_id.clone(), pattern.clone());
        Ok(true)
    }

    fn demote_pattern(&self, id: &PatternId) -> Result<CriticalPattern> {
        let mut guard = self.pattern_guard()?;
        let pattern = guard.get_mut(id).ok_or_else(|| pattern_not_found(id))?;
        pattern.still_active = false;
        Ok(pattern.clone())
    }
}
