//! # Compound
//!
//! A compounding knowledge engine for AI-assisted engineering workflows.
//!
//! Compound turns a solved problem (a bug fixed, a decision made) into a
//! durable, classified, de-duplicated solution document, and feeds those
//! documents back into future planning so the same class of problem is
//! avoided or solved faster next time.
//!
//! ## Pipeline
//!
//! ```text
//! Transcript ─▶ Extractor ─▶ Classifier ─▶ Deduplicator ─▶ Store ─▶ Promoter
//!                                              ▲              │
//!                                              └── consults ──┘
//! Planning ─▶ Retriever (read-only) ─▶ ranked SolutionDocuments
//! ```
//!
//! - Content-addressed documents: equivalent findings map to the same ID
//! - Near-duplicates are linked, not merged
//! - Recurring clusters are promoted into enforced critical patterns
//! - Pluggable storage (`SQLite`, filesystem, in-memory)
//!
//! ## Example
//!
//! ```rust,ignore
//! use compound::{KnowledgeEngine, Transcript};
//!
//! let engine = KnowledgeEngine::in_memory();
//! let outcome = engine.capture(&Transcript::new("session-1", [
//!     "Error: N+1 query in DashboardController when loading widgets",
//!     "Fixed by eager loading widgets with includes(:widgets)",
//! ]));
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::CompoundConfig;
pub use models::{
    Category, CriticalPattern, Extraction, Finding, PatternId, SearchHit, SessionId,
    SolutionDocument, SolutionId, Taxonomy, Transcript,
};
pub use services::{
    CaptureOutcome, Classifier, Deduplicator, Extractor, KnowledgeEngine, Promoter, Retriever,
};
pub use storage::{KnowledgeStore, PatternStore, SolutionStore};

/// Error type for compound operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad IDs, unparseable config values, malformed records |
/// | `Extraction` | Empty or malformed transcripts |
/// | `NotFound` | Store lookup of a missing document or pattern |
/// | `ConcurrentUpdateConflict` | A compare-and-swap lost against a concurrent writer |
/// | `OperationFailed` | I/O, `SQLite`, and serialization failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The transcript could not be processed.
    ///
    /// Raised only for malformed input (no events, only blank events,
    /// oversized events), never for sessions with nothing worth capturing.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// A store lookup missed.
    ///
    /// Callers of the deduplicator treat this as "create new".
    #[error("{kind} not found: {id}")]
    NotFound {
        /// The kind of entity looked up.
        kind: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// A read-modify-write lost against a concurrent writer.
    ///
    /// The caller must re-read and retry.
    #[error("concurrent update conflict on {id}")]
    ConcurrentUpdateConflict {
        /// The contended identifier.
        id: String,
    },

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from any displayable cause.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }

    /// Returns true if the error is a store miss.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if the error is a lost compare-and-swap.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrentUpdateConflict { .. })
    }
}

/// Result type alias for compound operations.
pub type Result<T> = std::result::Result<T, Error>;
