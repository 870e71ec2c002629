//! Core command handlers.
//!
//! Contains the implementation of the capture, ingest, search, show,
//! cluster and status commands.

use std::path::Path;

use anyhow::Context;
use compound::config::{CompoundConfig, StorageBackend};
use compound::models::{Category, SearchHit, SolutionDocument, SolutionId};
use compound::{CaptureOutcome, KnowledgeEngine};

use super::transcript::{load_transcript, transcript_files};

/// Parses a category name or alias.
pub fn parse_category(s: &str) -> anyhow::Result<Category> {
    Category::parse(s).with_context(|| {
        let known: Vec<&str> = Category::all().iter().map(Category::as_str).collect();
        format!("unknown category '{s}' (expected one of: {})", known.join(", "))
    })
}

/// Capture command.
pub fn cmd_capture(
    engine: &KnowledgeEngine,
    file: &Path,
    session: Option<String>,
    hint: Option<String>,
    json: bool,
) -> anyhow::Result<()> {
    let transcript = load_transcript(file, session, hint)?;
    let outcome = engine.capture(&transcript);

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match &outcome {
        CaptureOutcome::Captured {
            document,
            kind,
            pattern,
        } => {
            println!("Finding captured ({}):", kind.as_str());
            println!("  ID: {}", document.id);
            println!("  Category: {}", document.category);
            println!("  Title: {}", document.title);
            println!("  Occurrences: {}", document.occurrence_count);
            if let Some(pattern) = pattern {
                println!();
                println!("Promoted to critical pattern {}:", pattern.pattern_id);
                println!("  {}", pattern.statement);
            }
        },
        CaptureOutcome::NoFinding => println!("No actionable finding in session."),
        CaptureOutcome::Skipped { reason } => println!("Session skipped: {reason}"),
    }
    Ok(())
}

/// Ingest command.
pub async fn cmd_ingest(
    engine: &KnowledgeEngine,
    dir: &Path,
    concurrency: usize,
) -> anyhow::Result<()> {
    let files = transcript_files(dir)?;
    let mut transcripts = Vec::with_capacity(files.len());
    let mut unreadable = 0usize;
    for file in &files {
        match load_transcript(file, None, None) {
            Ok(transcript) => transcripts.push(transcript),
            Err(e) => {
                unreadable += 1;
                tracing::warn!(path = %file.display(), error = %format!("{e:#}"), "Skipping transcript");
            },
        }
    }

    let outcomes = engine.capture_batch(transcripts, concurrency).await;
    let captured = outcomes.iter().filter(|o| o.is_captured()).count();
    let no_finding = outcomes
        .iter()
        .filter(|o| matches!(o, CaptureOutcome::NoFinding))
        .count();
    let skipped = outcomes.len() - captured - no_finding + unreadable;
    let promoted = outcomes.iter().filter(|o| o.pattern().is_some()).count();

    println!("Ingested {} transcript(s) from {}", files.len(), dir.display());
    println!("  Captured: {captured}");
    println!("  No finding: {no_finding}");
    println!("  Skipped: {skipped}");
    println!("  Patterns promoted: {promoted}");
    Ok(())
}

/// Search command.
pub fn cmd_search(
    engine: &KnowledgeEngine,
    query: &str,
    category: Option<&str>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let category = category.map(parse_category).transpose()?;
    let hits = engine.search(query, category, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No matching solutions.");
        return Ok(());
    }

    println!("Found {} result(s):", hits.len());
    println!();
    for (i, hit) in hits.iter().enumerate() {
        print_hit(i + 1, hit);
    }
    Ok(())
}

fn print_hit(rank: usize, hit: &SearchHit) {
    let doc = &hit.document;
    if let Some(pattern) = &hit.pattern {
        println!("{rank}. [CRITICAL] {}", pattern.statement);
        println!("   Pattern: {}", pattern.pattern_id);
    } else {
        println!("{rank}. [{:.3}] {}", hit.score, doc.title);
    }
    println!("   ID: {} | {} | x{}", doc.id, doc.category, doc.occurrence_count);
    println!("   Fix: {}", doc.fix);
    println!();
}

/// Show command.
pub fn cmd_show(engine: &KnowledgeEngine, id: &str) -> anyhow::Result<()> {
    let doc = engine.get(&SolutionId::new(id))?;
    print_document(&doc);
    Ok(())
}

fn print_document(doc: &SolutionDocument) {
    println!("{}", doc.title);
    println!("{}", "=".repeat(doc.title.chars().count()));
    println!();
    println!("ID: {}", doc.id);
    println!("Category: {}", doc.category);
    println!("Occurrences: {}", doc.occurrence_count);
    println!("Created: {}", doc.created_at.to_rfc3339());
    println!("Updated: {}", doc.updated_at.to_rfc3339());
    if !doc.tags.is_empty() {
        let tags: Vec<&str> = doc.tags.iter().map(String::as_str).collect();
        println!("Tags: {}", tags.join(", "));
    }
    println!();
    println!("Symptom: {}", doc.symptom);
    if let Some(root_cause) = &doc.root_cause {
        println!("Root cause: {root_cause}");
    }
    println!("Fix: {}", doc.fix);
    if !doc.cross_refs.is_empty() {
        println!();
        println!("Related:");
        for id in &doc.cross_refs {
            println!("  - {id}");
        }
    }
    if !doc.source_refs.is_empty() {
        println!();
        println!("Sessions:");
        for session in &doc.source_refs {
            println!("  - {session}");
        }
    }
}

/// Cluster command.
pub fn cmd_cluster(engine: &KnowledgeEngine, id: &str) -> anyhow::Result<()> {
    let cluster = engine.cluster(&SolutionId::new(id))?;
    let total: u64 = cluster.iter().map(|d| u64::from(d.occurrence_count)).sum();

    println!("Cluster of {id}: {} document(s), {total} occurrence(s)", cluster.len());
    for doc in &cluster {
        println!("  - {} x{} {}", doc.id, doc.occurrence_count, doc.title);
    }
    Ok(())
}

/// Status command.
pub fn cmd_status(engine: &KnowledgeEngine, config: &CompoundConfig) -> anyhow::Result<()> {
    let stats = engine.stats()?;
    println!("Compound Status");
    println!("===============");
    println!();
    println!("Storage: {}", config.storage.backend);
    if config.storage.backend != StorageBackend::Memory {
        println!("Data Directory: {}", config.storage.resolved_data_dir().display());
    }
    println!("Documents: {}", stats.documents);
    println!("Occurrences: {}", stats.occurrences);
    println!(
        "Critical Patterns: {} active, {} demoted",
        stats.active_patterns, stats.demoted_patterns
    );
    if !stats.by_category.is_empty() {
        println!();
        println!("By Category:");
        for (category, count) in &stats.by_category {
            println!("  {category}: {count}");
        }
    }
    Ok(())
}
