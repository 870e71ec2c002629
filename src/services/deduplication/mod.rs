//! Deduplication of findings against stored solution documents.
//!
//! This module reconciles a classified finding with the store in two tiers:
//! 1. **Exact match**: the content-addressed ID already exists, so the
//!    document's occurrence count and provenance are updated
//! 2. **Near duplicate**: a similar same-category document exists, so a new
//!    document is created and cross-linked to it in both directions
//!
//! Anything else becomes a fresh document.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       Deduplicator                         │
//! │  ┌──────────────────┐          ┌─────────────────────────┐ │
//! │  │ ContentHasher    │          │ SimilarityWeights       │ │
//! │  │                  │          │                         │ │
//! │  │ SHA256 content   │  miss ─▶ │ Jaccard + Levenshtein   │ │
//! │  │ address lookup   │          │ over same category      │ │
//! │  └──────────────────┘          └─────────────────────────┘ │
//! │          every write: compare-and-swap on revision          │
//! └────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod hasher;
mod service;
pub mod similarity;
mod types;

pub use config::DeduplicationConfig;
pub use hasher::ContentHasher;
pub use service::Deduplicator;
pub use similarity::{Fingerprint, PairFingerprint, SimilarityWeights};
pub use types::{ReconcileKind, Reconciliation};
