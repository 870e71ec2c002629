//! Critical pattern command handlers.

use compound::KnowledgeEngine;
use compound::models::PatternId;

/// Patterns command.
pub fn cmd_patterns(engine: &KnowledgeEngine, all: bool) -> anyhow::Result<()> {
    let patterns = if all {
        engine.patterns()?
    } else {
        engine.active_patterns()?
    };

    if patterns.is_empty() {
        println!("No critical patterns.");
        return Ok(());
    }

    for pattern in &patterns {
        let state = if pattern.still_active { "active" } else { "demoted" };
        println!("{} [{state}]", pattern.pattern_id);
        println!("  {}", pattern.statement);
        println!(
            "  Source: {} | cluster of {} | promoted {}",
            pattern.source_document_id,
            pattern.cluster.len(),
            pattern.promoted_at.to_rfc3339()
        );
        println!();
    }
    Ok(())
}

/// Demote command.
pub fn cmd_demote(engine: &KnowledgeEngine, id: &str) -> anyhow::Result<()> {
    let pattern = engine.demote(&PatternId::new(id))?;
    println!("Pattern demoted: {}", pattern.pattern_id);
    println!("  {}", pattern.statement);
    Ok(())
}

/// Context command.
///
/// Prints the required-reading block, or nothing when no pattern is active,
/// so the output can be injected into a planning prompt as-is.
pub fn cmd_context(engine: &KnowledgeEngine) -> anyhow::Result<()> {
    let block = engine.required_reading()?;
    if !block.is_empty() {
        print!("{block}");
    }
    Ok(())
}
