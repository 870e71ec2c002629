//! Required-reading rendering for active critical patterns.
//!
//! The rendered block is consumed verbatim by the external prompting layer,
//! which injects it ahead of planning.

use crate::models::CriticalPattern;
use crate::storage::SolutionStore;
use crate::Result;
use std::fmt::Write as _;

/// Heading of the rendered block.
pub const REQUIRED_READING_HEADING: &str = "## Critical Patterns (required reading)";

/// Renders active patterns as a Markdown required-reading block.
///
/// One numbered entry per active pattern, in the order given: the statement,
/// then the source document's title, category, and cluster occurrence total.
/// Demoted patterns are skipped. Returns an empty string when nothing is
/// active.
///
/// # Errors
///
/// Returns an error if a source document lookup fails for a reason other
/// than a miss.
pub fn render_required_reading(
    patterns: &[CriticalPattern],
    store: &dyn SolutionStore,
) -> Result<String> {
    let active: Vec<&CriticalPattern> = patterns.iter().filter(|p| p.still_active).collect();
    if active.is_empty() {
        return Ok(String::new());
    }

    let mut out = String::new();
    let _ = writeln!(out, "{REQUIRED_READING_HEADING}");
    let _ = writeln!(out);
    for (index, pattern) in active.iter().enumerate() {
        let _ = writeln!(out, "{}. **{}**", index + 1, pattern.statement);

        let Some(source) = store.find(&pattern.source_document_id)? else {
            let _ = writeln!(out, "   - Source: `{}` (missing)", pattern.source_document_id);
            continue;
        };

        let mut total = 0_u64;
        for id in &pattern.cluster {
            if let Some(doc) = store.find(id)? {
                total += u64::from(doc.occurrence_count);
            }
        }
        let total = total.max(u64::from(source.occurrence_count));

        let _ = writeln!(out, "   - Source: {} (`{}`)", source.title, source.id);
        let _ = writeln!(out, "   - Category: {}", source.category);
        let _ = writeln!(out, "   - Occurrences: {total}");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Finding, PatternId, SolutionDocument, SolutionId};
    use crate::storage::MemoryStore;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn pattern(id: &str, source: &str, cluster: &[&str], active: bool) -> CriticalPattern {
        CriticalPattern {
            pattern_id: PatternId::new(id),
            source_document_id: SolutionId::new(source),
            statement: format!("Rule {id}"),
            promoted_at: Utc::now(),
            still_active: active,
            cluster: cluster.iter().map(|c| SolutionId::new(*c)).collect::<BTreeSet<_>>(),
        }
    }

    fn put(store: &MemoryStore, id: &str, count: u32) {
        let finding = Finding::new("s-1", "Slow dashboard query", "Add an index");
        let mut doc = SolutionDocument::from_finding(
            SolutionId::new(id),
            Category::PerformanceIssue,
            &finding,
            Utc::now(),
        );
        doc.occurrence_count = count;
        store.put(&doc).unwrap();
    }

    #[test]
    fn test_empty_when_nothing_active() {
        let store = MemoryStore::new();
        let rendered =
            render_required_reading(&[pattern("cp-1", "x", &[], false)], &store).unwrap();
        assert!(rendered.is_empty());
    }

    #[test]
    fn test_renders_numbered_entries() {
        let store = MemoryStore::new();
        put(&store, "performance-issue-a", 2);
        put(&store, "performance-issue-b", 1);

        let patterns = [
            pattern("cp-1", "performance-issue-a", &["performance-issue-a", "performance-issue-b"], true),
            pattern("cp-2", "performance-issue-gone", &[], true),
            pattern("cp-3", "performance-issue-a", &[], false),
        ];
        let rendered = render_required_reading(&patterns, &store).unwrap();

        assert!(rendered.starts_with(REQUIRED_READING_HEADING));
        assert!(rendered.contains("1. **Rule cp-1**"));
        assert!(rendered.contains("   - Source: Slow dashboard query (`performance-issue-a`)"));
        assert!(rendered.contains("   - Category: performance-issue"));
        assert!(rendered.contains("   - Occurrences: 3"));
        assert!(rendered.contains("2. **Rule cp-2**"));
        assert!(rendered.contains("(missing)"));
        assert!(!rendered.contains("cp-3"));
    }
}
