//! Benchmarks for near-duplicate scoring.
//!
//! Covers the per-candidate cost of the deduplicator: fingerprinting a
//! (symptom, fix) pair and scoring it against a comparison set.

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use compound::services::deduplication::{PairFingerprint, SimilarityWeights};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

// ============================================================================
// Helper Functions
// ============================================================================

fn candidates(n: usize) -> Vec<PairFingerprint> {
    (0..n)
        .map(|i| {
            PairFingerprint::new(
                &format!("Dashboard widget {i} query is slow when loading rows"),
                &format!("Eager load association {i} with includes"),
            )
        })
        .collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_fingerprint(c: &mut Criterion) {
    c.bench_function("fingerprint_pair", |b| {
        b.iter(|| {
            PairFingerprint::new(
                black_box("N+1 query in DashboardController when loading widgets"),
                black_box("Eager load widgets with includes(:widgets)"),
            )
        });
    });
}

fn bench_comparison_set(c: &mut Criterion) {
    let weights = SimilarityWeights::default();
    let probe = PairFingerprint::new(
        "Dashboard widget queries are slow",
        "Eager load widgets with includes",
    );

    let mut group = c.benchmark_group("comparison_set");
    for size in [10, 100, 500] {
        let set = candidates(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &set, |b, set| {
            b.iter(|| {
                set.iter()
                    .map(|candidate| weights.pair(&probe, candidate))
                    .fold(0.0_f32, f32::max)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fingerprint, bench_comparison_set);
criterion_main!(benches);
