//! Storage backend traits.

mod pattern;
mod solution;

pub use pattern::PatternStore;
pub use solution::SolutionStore;

pub(crate) use pattern::pattern_not_found;
pub(crate) use solution::{solution_conflict, solution_not_found};

/// A store holding both solution documents and critical patterns.
pub trait KnowledgeStore: SolutionStore + PatternStore {}

impl<T: SolutionStore + PatternStore + ?Sized> KnowledgeStore for T {}
