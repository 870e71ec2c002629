//! End-to-end scenarios over the knowledge engine.
//!
//! Each scenario drives whole transcripts through capture and checks the
//! resulting store state, promotion, and retrieval order.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use compound::models::{Category, Transcript};
use compound::services::ReconcileKind;
use compound::{CaptureOutcome, KnowledgeEngine};

fn transcript(session: &str, symptom: &str, fix: &str) -> Transcript {
    Transcript::new(
        session,
        [
            "Picking up the dashboard ticket.".to_string(),
            format!("Error: {symptom}"),
            format!("Fix: {fix}"),
        ],
    )
}

fn kind(outcome: &CaptureOutcome) -> &ReconcileKind {
    match outcome {
        CaptureOutcome::Captured { kind, .. } => kind,
        other => panic!("expected a captured finding, got {other:?}"),
    }
}

// ============================================================================
// Scenario A: recurring finding is promoted
// ============================================================================

#[test]
fn test_recurring_finding_is_promoted_to_critical_pattern() {
    let engine = KnowledgeEngine::in_memory();
    let fix = "Eager load widgets with includes";

    let first = engine.capture(&transcript("s-1", "Dashboard widget query is slow", fix));
    assert_eq!(kind(&first), &ReconcileKind::Created);
    let d1 = first.document().unwrap().clone();
    assert_eq!(d1.category, Category::PerformanceIssue);
    assert_eq!(d1.occurrence_count, 1);

    let second = engine.capture(&transcript("s-2", "Dashboard widget query is slow", fix));
    assert_eq!(kind(&second), &ReconcileKind::Incremented);
    assert_eq!(second.document().unwrap().id, d1.id);
    assert_eq!(second.document().unwrap().occurrence_count, 2);
    assert!(second.pattern().is_none());

    let third = engine.capture(&transcript("s-3", "Dashboard widget queries are slow", fix));
    let ReconcileKind::NearDuplicate { matched, .. } = kind(&third) else {
        panic!("expected a near duplicate, got {:?}", kind(&third));
    };
    assert_eq!(matched, &d1.id);
    let d2 = third.document().unwrap().clone();
    assert_ne!(d2.id, d1.id);
    assert!(d2.cross_refs.contains(&d1.id));
    assert!(engine.get(&d1.id).unwrap().cross_refs.contains(&d2.id));

    let pattern = third.pattern().expect("cluster of 3 occurrences is promoted");
    assert_eq!(pattern.source_document_id, d1.id);
    assert!(pattern.still_active);
    assert!(pattern.statement.starts_with("Eager load widgets"));
    assert_eq!(pattern.cluster.len(), 2);

    let active = engine.active_patterns().unwrap();
    assert_eq!(active.len(), 1);

    // A further occurrence does not emit a second pattern for the cluster.
    let fourth = engine.capture(&transcript("s-4", "Dashboard widget query is slow", fix));
    assert!(fourth.pattern().is_none());
    assert_eq!(engine.active_patterns().unwrap().len(), 1);
}

#[test]
fn test_plural_wording_of_n_plus_one_joins_cluster() {
    let engine = KnowledgeEngine::in_memory();
    let symptom = "N+1 query in DashboardController when loading widgets";
    let fix = "Eager load widgets with includes(:widgets)";

    let first = engine.capture(&transcript("s-1", symptom, fix));
    assert_eq!(kind(&first), &ReconcileKind::Created);
    let d1 = first.document().unwrap().clone();
    assert_eq!(d1.symptom, symptom);
    assert_eq!(d1.fix, fix);

    let second = engine.capture(&transcript("s-2", symptom, fix));
    assert_eq!(kind(&second), &ReconcileKind::Incremented);
    assert_eq!(second.document().unwrap().occurrence_count, 2);

    let third = engine.capture(&transcript(
        "s-3",
        "N+1 queries in DashboardController when loading widgets",
        fix,
    ));
    let ReconcileKind::NearDuplicate { matched, score } = kind(&third) else {
        panic!("expected a near duplicate, got {:?}", kind(&third));
    };
    assert_eq!(matched, &d1.id);
    assert!(*score > 0.55);

    let pattern = third.pattern().expect("cluster of 3 occurrences is promoted");
    assert_eq!(pattern.source_document_id, d1.id);
    assert_eq!(engine.active_patterns().unwrap().len(), 1);
}

#[test]
fn test_two_occurrences_are_not_promoted() {
    let engine = KnowledgeEngine::in_memory();
    for session in ["s-1", "s-2"] {
        engine.capture(&transcript(
            session,
            "Checkout page timeout under load",
            "Cache the shipping rates",
        ));
    }
    assert!(engine.active_patterns().unwrap().is_empty());
    assert!(engine.required_reading().unwrap().is_empty());
}

// ============================================================================
// Scenario B: nothing actionable
// ============================================================================

#[test]
fn test_session_without_finding_leaves_store_untouched() {
    let engine = KnowledgeEngine::in_memory();
    let chat = Transcript::new(
        "s-1",
        [
            "Good morning, let's plan the sprint.",
            "Sounds good, I will update the board.",
        ],
    );

    assert_eq!(engine.capture(&chat), CaptureOutcome::NoFinding);
    let stats = engine.stats().unwrap();
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.active_patterns, 0);
}

#[test]
fn test_malformed_session_is_skipped_not_fatal() {
    let engine = KnowledgeEngine::in_memory();
    let outcome = engine.capture(&Transcript::new("s-1", Vec::<String>::new()));
    assert!(matches!(outcome, CaptureOutcome::Skipped { .. }));

    let after = engine.capture(&transcript(
        "s-2",
        "Database connection leak in the importer",
        "Close the connection in an ensure block",
    ));
    assert!(after.is_captured());
}

// ============================================================================
// Scenario C: filtered search puts patterns first
// ============================================================================

#[test]
fn test_filtered_search_orders_patterns_first() {
    let engine = KnowledgeEngine::in_memory();

    for session in ["s-1", "s-2", "s-3"] {
        engine.capture(&transcript(
            session,
            "Database connection leak in background worker",
            "Return the database connection to the pool after each job",
        ));
    }
    let findings = [
        ("Database connection refused after postgres restart", "Retry the initial connect"),
        ("SQL migration locks the orders table", "Split the migration into batches"),
        ("Database connection pool exhausted during deploy", "Raise the pool size for workers"),
        ("Deadlock between two transaction updates", "Lock rows in id order"),
        ("Database connection string missing sslmode", "Set sslmode to require"),
        ("Schema drift between staging and production database", "Dump the schema in CI"),
        ("Database connection timeout in reporting job", "Move reports to the replica"),
    ];
    for (i, (symptom, fix)) in findings.iter().enumerate() {
        engine.capture(&transcript(&format!("t-{i}"), symptom, fix));
    }
    engine.capture(&transcript(
        "u-1",
        "Sidebar layout overflow on mobile",
        "Wrap the css grid",
    ));

    let hits = engine
        .search("database connection leak", Some(Category::DatabaseIssue), Some(5))
        .unwrap();

    assert!(!hits.is_empty());
    assert!(hits.len() <= 5);
    assert!(hits[0].is_pattern());
    assert!(hits[0].document.symptom.contains("leak"));
    assert!(hits.iter().all(|h| h.document.category == Category::DatabaseIssue));

    let first_plain = hits.iter().position(|h| !h.is_pattern()).unwrap_or(hits.len());
    assert!(hits[first_plain..].iter().all(|h| !h.is_pattern()));
    for pair in hits[first_plain..].windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn test_demoted_pattern_no_longer_leads_search() {
    let engine = KnowledgeEngine::in_memory();
    for session in ["s-1", "s-2", "s-3"] {
        engine.capture(&transcript(
            session,
            "Database connection leak in background worker",
            "Return the connection to the pool",
        ));
    }
    let pattern = engine.active_patterns().unwrap().remove(0);
    engine.demote(&pattern.pattern_id).unwrap();

    let hits = engine.search("database connection leak", None, None).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(!hits[0].is_pattern());
    assert!(engine.required_reading().unwrap().is_empty());
}

#[test]
fn test_blank_query_is_rejected() {
    let engine = KnowledgeEngine::in_memory();
    let err = engine.search("   ", None, None).unwrap_err();
    assert!(matches!(err, compound::Error::InvalidInput(_)));
}
