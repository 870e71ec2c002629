//! Data models for compound.
//!
//! This module contains the core data structures shared by the services
//! and storage backends.

mod category;
mod finding;
mod pattern;
mod search;
mod session;
mod solution;

pub(crate) use category::normalize_phrase;
pub use category::{Category, Taxonomy};
pub use finding::{ExcerptRef, ExcerptRole, Extraction, Finding};
pub use pattern::{CriticalPattern, PatternId};
pub use search::SearchHit;
pub use session::{SessionEvent, SessionId, Transcript};
pub use solution::{SolutionDocument, SolutionId, derive_title};
