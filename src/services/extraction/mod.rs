//! Finding extraction from session transcripts.
//!
//! Each event is split into segments (lines, then sentences) and every
//! segment is scored against static signal tables for the three finding
//! roles: symptom, root cause, and fix. The strongest symptom and fix
//! segments form the finding; a session without both yields
//! [`Extraction::NoFinding`](crate::models::Extraction::NoFinding).

mod extractor;
pub mod patterns;

pub use extractor::{ExtractionConfig, Extractor};
