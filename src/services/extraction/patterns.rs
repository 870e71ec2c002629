//! Signal patterns for finding extraction.
//!
//! Static regex tables that score transcript segments for the three finding
//! roles. Explicit labels (`Error:`, `Fix:`...) outweigh everything else.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::models::ExcerptRole;
use regex::Regex;
use std::sync::LazyLock;

/// Weight of an explicit label such as `Fix:`.
pub const LABEL_WEIGHT: f32 = 10.0;

/// A role signal pattern with its weight.
#[derive(Debug)]
pub struct RoleSignal {
    /// The regex pattern to match.
    pub pattern: Regex,
    /// The role this pattern indicates.
    pub role: ExcerptRole,
    /// Score contributed when the pattern matches.
    pub weight: f32,
    /// Human-readable description of the signal.
    pub description: &'static str,
}

/// Leading role label, stripped from extracted fields.
pub static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:[-*>]\s*)?(?:symptom|error|problem|issue|bug|observed|failure|root\s+cause|cause|reason|fix|fixed|solution|resolution|resolved|workaround|decision|decided)\s*:\s*",
    )
    .expect("static regex: label prefix")
});

/// Static role signals.
pub static ROLE_SIGNALS: LazyLock<Vec<RoleSignal>> = LazyLock::new(|| {
    vec![
        // Symptom patterns
        RoleSignal {
            pattern: Regex::new(
                r"(?i)^\s*(?:[-*>]\s*)?(symptom|error|problem|issue|bug|observed|failure)\s*:",
            )
            .expect("static regex: symptom label"),
            role: ExcerptRole::Symptom,
            weight: LABEL_WEIGHT,
            description: "symptom label",
        },
        RoleSignal {
            pattern: Regex::new(r"(?i)\b(error|exception|panic(ked)?|traceback|stack\s+trace)\b")
                .expect("static regex: error words"),
            role: ExcerptRole::Symptom,
            weight: 3.0,
            description: "error/exception/panic",
        },
        RoleSignal {
            pattern: Regex::new(
                r"(?i)\b(fail(s|ed|ing|ure)?|crash(es|ed|ing)?|broken|time[sd]?\s+out|timeout)\b",
            )
            .expect("static regex: failure words"),
            role: ExcerptRole::Symptom,
            weight: 3.0,
            description: "fails/crashes/broken/timeout",
        },
        RoleSignal {
            pattern: Regex::new(
                r"(?i)\b(slow(ly|er)?|hang(s|ing)?|freez(e|es|ing)|leak(s|ed|ing)?|n\+1)\b",
            )
            .expect("static regex: degradation words"),
            role: ExcerptRole::Symptom,
            weight: 2.0,
            description: "slow/hangs/leaks",
        },
        RoleSignal {
            pattern: Regex::new(
                r"(?i)\b(returns?|returned|throws?|threw|raises?|raised)\b.*\b(\d{3}|null|nil|none|undefined|empty)\b",
            )
            .expect("static regex: unexpected result"),
            role: ExcerptRole::Symptom,
            weight: 2.0,
            description: "returns 500/null",
        },
        RoleSignal {
            pattern: Regex::new(
                r"(?i)\b(doesn't|does\s+not|won't|can't|cannot|isn't|not)\s+(work|load|render|compile|build|start|connect|save|display)",
            )
            .expect("static regex: not working"),
            role: ExcerptRole::Symptom,
            weight: 2.0,
            description: "does not work/load",
        },
        RoleSignal {
            pattern: Regex::new(
                r"(?i)\b(need(ed)?\s+to\s+(choose|decide|pick)|should\s+we|trade-?offs?)\b",
            )
            .expect("static regex: decision context"),
            role: ExcerptRole::Symptom,
            weight: 2.0,
            description: "need to choose/should we",
        },
        RoleSignal {
            pattern: Regex::new(r"(?i)\b(bug|regression|issue|problem|misaligned|overflow(s|ing)?)\b")
                .expect("static regex: problem words"),
            role: ExcerptRole::Symptom,
            weight: 1.0,
            description: "bug/issue/problem",
        },
        // Root cause patterns
        RoleSignal {
            pattern: Regex::new(r"(?i)^\s*(?:[-*>]\s*)?(root\s+cause|cause|reason)\s*:")
                .expect("static regex: root cause label"),
            role: ExcerptRole::RootCause,
            weight: LABEL_WEIGHT,
            description: "root cause label",
        },
        RoleSignal {
            pattern: Regex::new(r"(?i)\b(because|caused\s+by|due\s+to|root\s+cause|the\s+reason)\b")
                .expect("static regex: causal words"),
            role: ExcerptRole::RootCause,
            weight: 3.0,
            description: "because/caused by/due to",
        },
        RoleSignal {
            pattern: Regex::new(r"(?i)\b(turned\s+out|it\s+was|(was|were)\s+missing)\b")
                .expect("static regex: discovery words"),
            role: ExcerptRole::RootCause,
            weight: 2.0,
            description: "turned out/was missing",
        },
        // Fix patterns
        RoleSignal {
            pattern: Regex::new(
                r"(?i)^\s*(?:[-*>]\s*)?(fix|fixed|solution|resolution|resolved|workaround|decision|decided)\s*:",
            )
            .expect("static regex: fix label"),
            role: ExcerptRole::Fix,
            weight: LABEL_WEIGHT,
            description: "fix label",
        },
        RoleSignal {
            pattern: Regex::new(r"(?i)\b(fixed|resolved|solved|the\s+fix|the\s+solution|workaround)\b")
                .expect("static regex: resolution words"),
            role: ExcerptRole::Fix,
            weight: 3.0,
            description: "fixed/resolved/the fix",
        },
        RoleSignal {
            pattern: Regex::new(
                r"(?i)\b(we\s+decided|decided\s+to|chose|going\s+with|we('ll|\s+will)\s+use)\b",
            )
            .expect("static regex: decision words"),
            role: ExcerptRole::Fix,
            weight: 3.0,
            description: "decided to/chose/going with",
        },
        RoleSignal {
            pattern: Regex::new(
                r"(?i)^\s*(?:[-*>]\s*)?(add|use|switch|replace|change|update|upgrade|pin|remove|wrap|enable|disable|set|increase|decrease|move|rename|eager[- ]load|cache|index|escape|validate|sanitize|retry)\b",
            )
            .expect("static regex: imperative change"),
            role: ExcerptRole::Fix,
            weight: 2.0,
            description: "imperative change at start",
        },
        RoleSignal {
            pattern: Regex::new(
                r"(?i)\b(added|switched\s+to|replaced|changed|updated|upgraded|pinned|removed|wrapped|enabled|disabled|moved|renamed|by\s+(adding|using|switching|replacing|removing|eager))\b",
            )
            .expect("static regex: past change"),
            role: ExcerptRole::Fix,
            weight: 1.0,
            description: "added/switched to/replaced",
        },
    ]
});

/// Scores a segment for one role.
#[must_use]
pub fn role_score(text: &str, role: ExcerptRole) -> f32 {
    ROLE_SIGNALS
        .iter()
        .filter(|s| s.role == role && s.pattern.is_match(text))
        .map(|s| s.weight)
        .sum()
}

/// Descriptions of the signals of `role` that match a segment.
#[must_use]
pub fn matched_signals(text: &str, role: ExcerptRole) -> Vec<&'static str> {
    ROLE_SIGNALS
        .iter()
        .filter(|s| s.role == role && s.pattern.is_match(text))
        .map(|s| s.description)
        .collect()
}

/// Removes a leading role label.
#[must_use]
pub fn strip_label(text: &str) -> &str {
    LABEL_PREFIX
        .find(text)
        .map_or(text, |m| &text[m.end()..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_signals_compile() {
        assert!(!ROLE_SIGNALS.is_empty());
        for role in [ExcerptRole::Symptom, ExcerptRole::RootCause, ExcerptRole::Fix] {
            assert!(ROLE_SIGNALS.iter().any(|s| s.role == role));
        }
    }

    #[test]
    fn test_labels_dominate() {
        assert!(role_score("Fix: use a connection pool", ExcerptRole::Fix) >= LABEL_WEIGHT);
        assert!(role_score("Error: connection refused", ExcerptRole::Symptom) >= LABEL_WEIGHT);
        assert!(role_score("Root cause: missing index", ExcerptRole::RootCause) >= LABEL_WEIGHT);
    }

    #[test]
    fn test_plain_chat_scores_zero() {
        let text = "Thanks, that looks great. Let's grab lunch.";
        assert!(role_score(text, ExcerptRole::Symptom).abs() < f32::EPSILON);
        assert!(role_score(text, ExcerptRole::Fix).abs() < f32::EPSILON);
    }

    #[test]
    fn test_matched_signals_names_each_hit() {
        let signals = matched_signals("Error: the worker crashed", ExcerptRole::Symptom);
        assert_eq!(signals, vec!["symptom label", "error/exception/panic", "fails/crashes/broken/timeout"]);
        assert!(matched_signals("Fix: add an index", ExcerptRole::Symptom).is_empty());
    }

    #[test]
    fn test_strip_label() {
        assert_eq!(strip_label("Fix: add an index"), "add an index");
        assert_eq!(strip_label("  - Root cause:   stale cache"), "stale cache");
        assert_eq!(strip_label("Added an index"), "Added an index");
    }
}
