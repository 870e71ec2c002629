//! Business logic services.
//!
//! Services orchestrate the storage backends and provide the high-level
//! operations of the engine.
//!
//! | Service | Role |
//! |---------|------|
//! | [`Extractor`] | Transcript to finding |
//! | [`Classifier`] | Finding to category |
//! | [`Deduplicator`] | Reconciles a finding against the store |
//! | [`Promoter`] | Promotes recurring clusters to critical patterns |
//! | [`Retriever`] | Ranked planning-time search |
//! | [`KnowledgeEngine`] | End-to-end pipeline over one store |

pub mod classifier;
pub mod deduplication;
pub mod enforcement;
mod engine;
pub mod extraction;
pub mod promotion;
pub mod retrieval;

pub use classifier::{Classification, Classifier, ClassifierConfig};
pub use deduplication::{DeduplicationConfig, Deduplicator, ReconcileKind, Reconciliation};
pub use enforcement::render_required_reading;
pub use engine::{CaptureOutcome, EngineStats, KnowledgeEngine};
pub use extraction::{ExtractionConfig, Extractor};
pub use promotion::{PromotionConfig, Promoter};
pub use retrieval::{RetrievalConfig, Retriever};
