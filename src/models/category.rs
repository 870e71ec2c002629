//! Category taxonomy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Problem categories a solution document can be filed under.
///
/// The set is closed; [`Category::Other`] is the escape value for findings
/// that cannot be classified with enough confidence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    /// Compilation, linking, and dependency resolution failures.
    BuildError,
    /// Failing or flaky tests.
    TestFailure,
    /// Crashes, panics, and exceptions at runtime.
    RuntimeError,
    /// Slowness, excess allocations, query storms.
    PerformanceIssue,
    /// Migrations, connections, queries, and schema problems.
    DatabaseIssue,
    /// Vulnerabilities, auth gaps, and leaked secrets.
    SecurityIssue,
    /// Rendering, layout, and interaction bugs.
    UiBug,
    /// A reusable convention worth repeating.
    Pattern,
    /// An architectural or design decision.
    Decision,
    /// Unclassified findings.
    #[default]
    Other,
}

impl Category {
    /// Returns the classifiable categories (excludes [`Category::Other`]).
    #[must_use]
    pub const fn taxonomy() -> &'static [Self] {
        &[
            Self::BuildError,
            Self::TestFailure,
            Self::RuntimeError,
            Self::PerformanceIssue,
            Self::DatabaseIssue,
            Self::SecurityIssue,
            Self::UiBug,
            Self::Pattern,
            Self::Decision,
        ]
    }

    /// Returns every category, including [`Category::Other`].
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::BuildError,
            Self::TestFailure,
            Self::RuntimeError,
            Self::PerformanceIssue,
            Self::DatabaseIssue,
            Self::SecurityIssue,
            Self::UiBug,
            Self::Pattern,
            Self::Decision,
            Self::Other,
        ]
    }

    /// Returns the category as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BuildError => "build-error",
            Self::TestFailure => "test-failure",
            Self::RuntimeError => "runtime-error",
            Self::PerformanceIssue => "performance-issue",
            Self::DatabaseIssue => "database-issue",
            Self::SecurityIssue => "security-issue",
            Self::UiBug => "ui-bug",
            Self::Pattern => "pattern",
            Self::Decision => "decision",
            Self::Other => "other",
        }
    }

    /// Parses a category from its name or a common alias.
    ///
    /// Accepts `-`, `_` and space separators in any case.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c })
            .collect();

        match key.as_str() {
            "build-error" | "build" | "compile-error" | "build-errors" => Some(Self::BuildError),
            "test-failure" | "test" | "tests" | "test-failures" => Some(Self::TestFailure),
            "runtime-error" | "runtime" | "crash" | "runtime-errors" => Some(Self::RuntimeError),
            "performance-issue" | "performance" | "perf" | "performance-issues" => {
                Some(Self::PerformanceIssue)
            },
            "database-issue" | "database" | "db" | "database-issues" => Some(Self::DatabaseIssue),
            "security-issue" | "security" | "sec" | "security-issues" => Some(Self::SecurityIssue),
            "ui-bug" | "ui" | "frontend" | "ui-bugs" => Some(Self::UiBug),
            "pattern" | "patterns" | "best-practice" => Some(Self::Pattern),
            "decision" | "decisions" | "adr" => Some(Self::Decision),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-category lexicon used by the classifier.
///
/// Built once at startup from the built-in phrases plus any configured
/// additions; shared read-only afterwards.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    lexicons: BTreeMap<Category, Vec<String>>,
}

impl Taxonomy {
    /// Builds the taxonomy with the built-in lexicon.
    #[must_use]
    pub fn builtin() -> Self {
        let mut lexicons = BTreeMap::new();
        for &category in Category::taxonomy() {
            let phrases = builtin_phrases(category)
                .iter()
                .map(|p| normalize_phrase(p))
                .collect();
            lexicons.insert(category, phrases);
        }
        Self { lexicons }
    }

    /// Builds the taxonomy with extra phrases appended to the built-in lexicon.
    ///
    /// Unknown category names and [`Category::Other`] are ignored.
    #[must_use]
    pub fn with_extra_phrases(extra: &BTreeMap<String, Vec<String>>) -> Self {
        let mut taxonomy = Self::builtin();
        for (name, phrases) in extra {
            let Some(category) = Category::parse(name).filter(|c| *c != Category::Other) else {
                tracing::warn!(category = %name, "Ignoring lexicon for unknown category");
                continue;
            };
            let entry = taxonomy.lexicons.entry(category).or_default();
            for phrase in phrases {
                let phrase = normalize_phrase(phrase);
                if !phrase.is_empty() && !entry.contains(&phrase) {
                    entry.push(phrase);
                }
            }
        }
        taxonomy
    }

    /// Returns the normalized phrases for a category.
    #[must_use]
    pub fn phrases(&self, category: Category) -> &[String] {
        self.lexicons.get(&category).map_or(&[], Vec::as_slice)
    }

    /// Iterates over categories and their phrases in taxonomy order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.lexicons.iter().map(|(c, p)| (*c, p.as_slice()))
    }
}

impl Default for Taxonomy {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercases a phrase and collapses it to single-space separated words.
pub(crate) fn normalize_phrase(phrase: &str) -> String {
    phrase
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '+')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

const fn builtin_phrases(category: Category) -> &'static [&'static str] {
    match category {
        Category::BuildError => &[
            "build",
            "compile",
            "compiler",
            "compilation",
            "linker",
            "link error",
            "cargo build",
            "webpack",
            "bundler",
            "dependency resolution",
            "missing dependency",
            "unresolved import",
            "type error",
            "syntax error",
            "build failed",
            "gemfile",
            "lockfile",
        ],
        Category::TestFailure => &[
            "test",
            "tests",
            "spec",
            "rspec",
            "flaky",
            "assertion",
            "assertion failed",
            "test failure",
            "failing test",
            "test suite",
            "fixture",
            "mock",
            "ci",
            "expected but got",
        ],
        Category::RuntimeError => &[
            "exception",
            "panic",
            "crash",
            "crashed",
            "segfault",
            "nil",
            "null pointer",
            "undefined method",
            "nomethoderror",
            "stack trace",
            "traceback",
            "runtime error",
            "unhandled",
            "500 error",
        ],
        Category::PerformanceIssue => &[
            "slow",
            "latency",
            "performance",
            "n+1",
            "n+1 query",
            "memory leak",
            "timeout",
            "cpu",
            "throughput",
            "cache miss",
            "eager load",
            "eager loading",
            "bottleneck",
            "profiling",
        ],
        Category::DatabaseIssue => &[
            "database",
            "sql",
            "query",
            "migration",
            "schema",
            "index",
            "postgres",
            "postgresql",
            "mysql",
            "sqlite",
            "deadlock",
            "connection pool",
            "database connection",
            "transaction",
            "foreign key",
            "activerecord",
        ],
        Category::SecurityIssue => &[
            "security",
            "vulnerability",
            "xss",
            "csrf",
            "sql injection",
            "injection",
            "authentication",
            "authorization",
            "auth",
            "secret",
            "api key",
            "token leak",
            "permission",
            "cve",
        ],
        Category::UiBug => &[
            "ui",
            "css",
            "layout",
            "render",
            "rendering",
            "button",
            "modal",
            "responsive",
            "dark mode",
            "alignment",
            "overflow",
            "stimulus",
            "turbo",
            "frontend",
        ],
        Category::Pattern => &[
            "pattern",
            "convention",
            "best practice",
            "always",
            "never",
            "idiom",
            "reusable",
            "standardize",
        ],
        Category::Decision => &[
            "decided",
            "decision",
            "chose",
            "choose",
            "trade off",
            "tradeoff",
            "adopt",
            "instead of",
            "architecture",
            "we will use",
            "going with",
        ],
        Category::Other => &[],
    }
}
