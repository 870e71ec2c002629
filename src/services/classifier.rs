//! Deterministic finding classification.
//!
//! Scores each taxonomy category by the lexicon phrases found in the
//! finding's fields, weighted per field, plus an optional hint bonus.
//!
//! # Scoring
//!
//! | Source | Contribution |
//! |--------|--------------|
//! | Phrase in symptom | words in phrase × `symptom_weight` (1.0) |
//! | Phrase in root cause | words in phrase × `root_cause_weight` (0.8) |
//! | Phrase in fix | words in phrase × `fix_weight` (0.6) |
//! | Hint resolving to the category | `hint_bonus` (1.0) |
//!
//! Highest score wins. An exact tie goes to the category with the longest
//! matched phrase; a remaining tie, or a top score below `min_confidence`,
//! yields [`Category::Other`] flagged as ambiguous.

use crate::models::{Category, Finding, Taxonomy, normalize_phrase};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::instrument;

/// Scores closer than this are treated as tied.
const SCORE_EPSILON: f32 = 1e-4;

/// Classifier configuration.
///
/// Loaded from the `[classifier]` config section; `[classifier.lexicon]`
/// maps category names to extra phrases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Weight of phrases found in the symptom.
    pub symptom_weight: f32,
    /// Weight of phrases found in the root cause.
    pub root_cause_weight: f32,
    /// Weight of phrases found in the fix.
    pub fix_weight: f32,
    /// Bonus for the category a hint resolves to.
    pub hint_bonus: f32,
    /// Top scores below this yield `other`.
    pub min_confidence: f32,
    /// Extra lexicon phrases per category name.
    pub lexicon: BTreeMap<String, Vec<String>>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            symptom_weight: 1.0,
            root_cause_weight: 0.8,
            fix_weight: 0.6,
            hint_bonus: 1.0,
            min_confidence: 1.0,
            lexicon: BTreeMap::new(),
        }
    }
}

/// Detailed classification result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    /// The chosen category.
    pub category: Category,
    /// The winning score (the top score when ambiguous).
    pub score: f32,
    /// True when the category fell back to `other` for want of a clear winner.
    pub ambiguous: bool,
    /// Phrases matched for the chosen category.
    pub matched_phrases: Vec<String>,
}

/// Per-category accumulator.
#[derive(Debug, Default)]
struct CategoryScore {
    score: f32,
    longest_phrase: usize,
    matched: Vec<String>,
}

/// Maps findings to taxonomy categories.
///
/// # Example
///
/// ```rust
/// use compound::models::Finding;
/// use compound::{Category, Classifier};
///
/// let classifier = Classifier::default();
/// let finding = Finding::new(
///     "s-1",
///     "N+1 query in DashboardController",
///     "Eager load widgets",
/// );
/// assert_eq!(classifier.classify(&finding), Category::PerformanceIssue);
/// ```
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
    taxonomy: Arc<Taxonomy>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl Classifier {
    /// Creates a classifier, building the taxonomy from the built-in lexicon
    /// plus the configured extra phrases.
    #[must_use]
    pub fn new(config: ClassifierConfig) -> Self {
        let taxonomy = Arc::new(Taxonomy::with_extra_phrases(&config.lexicon));
        Self { config, taxonomy }
    }

    /// Creates a classifier sharing an existing taxonomy.
    #[must_use]
    pub const fn with_taxonomy(config: ClassifierConfig, taxonomy: Arc<Taxonomy>) -> Self {
        Self { config, taxonomy }
    }

    /// Returns the taxonomy.
    #[must_use]
    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    /// Classifies a finding.
    #[must_use]
    pub fn classify(&self, finding: &Finding) -> Category {
        self.classify_detailed(finding).category
    }

    /// Classifies a finding, returning scores and the matched phrases.
    #[instrument(skip(self, finding), fields(operation = "classify", session = %finding.session_id))]
    pub fn classify_detailed(&self, finding: &Finding) -> Classification {
        let mut scores = self.score_fields(finding);

        if let Some(category) = finding
            .category_hint
            .as_deref()
            .and_then(|hint| self.resolve_hint(hint))
        {
            scores.entry(category).or_default().score += self.config.hint_bonus;
        }

        let top = scores.values().map(|s| s.score).fold(0.0_f32, f32::max);
        let leaders: Vec<(&Category, &CategoryScore)> = scores
            .iter()
            .filter(|(_, s)| (s.score - top).abs() < SCORE_EPSILON)
            .collect();

        let candidates = leaders.len();
        let winner = match leaders.as_slice() {
            [] => None,
            [(category, _)] => Some(**category),
            tied => {
                let longest = tied.iter().map(|(_, s)| s.longest_phrase).max().unwrap_or(0);
                let mut by_phrase = tied.iter().filter(|(_, s)| s.longest_phrase == longest);
                match (by_phrase.next(), by_phrase.next()) {
                    (Some((category, _)), None) => Some(**category),
                    _ => None,
                }
            },
        };

        match winner {
            Some(category) if top >= self.config.min_confidence => {
                let matched = scores
                    .remove(&category)
                    .map(|s| s.matched)
                    .unwrap_or_default();
                tracing::debug!(category = %category, score = top, "Classified finding");
                Classification {
                    category,
                    score: top,
                    ambiguous: false,
                    matched_phrases: matched,
                }
            },
            _ => {
                tracing::info!(
                    top_score = top,
                    candidates,
                    "Ambiguous classification, falling back to other"
                );
                metrics::counter!("compound_classification_ambiguous_total").increment(1);
                Classification {
                    category: Category::Other,
                    score: top,
                    ambiguous: true,
                    matched_phrases: Vec::new(),
                }
            },
        }
    }

    /// Accumulates phrase matches over the weighted fields.
    fn score_fields(&self, finding: &Finding) -> BTreeMap<Category, CategoryScore> {
        let fields = [
            (Some(finding.symptom.as_str()), self.config.symptom_weight),
            (finding.root_cause.as_deref(), self.config.root_cause_weight),
            (Some(finding.fix.as_str()), self.config.fix_weight),
        ];
        let padded: Vec<(String, f32)> = fields
            .into_iter()
            .filter_map(|(text, weight)| text.map(|t| (pad(&normalize_phrase(t)), weight)))
            .collect();

        let mut scores: BTreeMap<Category, CategoryScore> = BTreeMap::new();
        for (category, phrases) in self.taxonomy.iter() {
            for phrase in phrases {
                let needle = pad(phrase);
                for (text, weight) in &padded {
                    if !text.contains(&needle) {
                        continue;
                    }
                    let entry = scores.entry(category).or_default();
                    #[allow(clippy::cast_precision_loss)]
                    let words = phrase.split(' ').count() as f32;
                    entry.score += words * weight;
                    entry.longest_phrase = entry.longest_phrase.max(phrase.len());
                    if !entry.matched.contains(phrase) {
                        entry.matched.push(phrase.clone());
                    }
                }
            }
        }
        scores
    }

    /// Resolves a free-text hint to a category by name, alias, or lexicon.
    ///
    /// Lexicon resolution picks the category with the longest phrase found
    /// in the hint, earliest in taxonomy order on ties.
    fn resolve_hint(&self, hint: &str) -> Option<Category> {
        if let Some(category) = Category::parse(hint).filter(|c| *c != Category::Other) {
            return Some(category);
        }
        let text = pad(&normalize_phrase(hint));
        let mut best: Option<(Category, usize)> = None;
        for (category, phrases) in self.taxonomy.iter() {
            for phrase in phrases {
                if text.contains(&pad(phrase)) && best.is_none_or(|(_, len)| phrase.len() > len) {
                    best = Some((category, phrase.len()));
                }
            }
        }
        best.map(|(category, _)| category)
    }
}

/// Surrounds text with spaces so substring search respects word boundaries.
fn pad(text: &str) -> String {
    format!(" {text} ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn finding(symptom: &str, fix: &str) -> Finding {
        Finding::new("s-1", symptom, fix)
    }

    #[test_case("N+1 query in DashboardController", "Eager load widgets" => Category::PerformanceIssue; "n plus one")]
    #[test_case("Login page crashes with NoMethodError on nil", "Guard the nil session" => Category::RuntimeError; "nil crash")]
    #[test_case("Flaky test in the checkout spec", "Freeze time in the test" => Category::TestFailure; "flaky spec")]
    #[test_case("SQL injection in search endpoint", "Use bound parameters" => Category::SecurityIssue; "injection")]
    #[test_case("Modal button overflows on mobile layout", "Wrap with flex container" => Category::UiBug; "layout")]
    #[test_case("Database connection leak under load", "Return connections to the connection pool" => Category::DatabaseIssue; "connection leak")]
    fn test_classify(symptom: &str, fix: &str) -> Category {
        Classifier::default().classify(&finding(symptom, fix))
    }

    #[test]
    fn test_no_signal_is_ambiguous_other() {
        let result = Classifier::default().classify_detailed(&finding("Hmm", "Okay"));
        assert_eq!(result.category, Category::Other);
        assert!(result.ambiguous);
        assert!(result.score.abs() < f32::EPSILON);
    }

    #[test]
    fn test_word_boundaries() {
        // "testing" must not match "test", "uid" must not match "ui"
        let classifier = Classifier::default();
        let result = classifier.classify_detailed(&finding("uid attesting", "nothing"));
        assert_eq!(result.category, Category::Other);
    }

    #[test]
    fn test_hint_is_a_bonus() {
        let classifier = Classifier::default();
        let plain = finding("Widget rendering is misaligned", "Fix the css");
        assert_eq!(classifier.classify(&plain), Category::UiBug);

        // Hint breaks no strong signal, but adds its bonus
        let hinted = plain.clone().with_hint("performance");
        let result = classifier.classify_detailed(&hinted);
        assert_eq!(result.category, Category::UiBug);

        let weak = finding("Something odd", "Changed it").with_hint("decision");
        let result = classifier.classify_detailed(&weak);
        assert_eq!(result.category, Category::Decision);
        assert!(!result.ambiguous);
    }

    #[test]
    fn test_lexicon_lead_outweighs_conflicting_hint() {
        let classifier = Classifier::default();
        let hinted = finding("Memory leak in the worker", "Restart it").with_hint("ui");
        let result = classifier.classify_detailed(&hinted);
        assert_eq!(result.category, Category::PerformanceIssue);
        assert!(!result.ambiguous);

        // With no lexicon hit at all the hint alone reaches min_confidence
        let bare = finding("Something odd", "Restart it").with_hint("ui");
        assert_eq!(classifier.classify(&bare), Category::UiBug);
    }

    #[test]
    fn test_hint_resolved_through_lexicon() {
        let classifier = Classifier::default();
        let weak = finding("Something odd", "Changed it").with_hint("looks like a memory leak");
        assert_eq!(classifier.classify(&weak), Category::PerformanceIssue);
    }

    #[test]
    fn test_tie_broken_by_longest_phrase() {
        // "sql" (database, 1 word) vs "css" (ui, 1 word): equal scores and
        // equal phrase lengths -> ambiguous
        let classifier = Classifier::default();
        let tied = classifier.classify_detailed(&finding("sql css", "nothing"));
        assert_eq!(tied.category, Category::Other);
        assert!(tied.ambiguous);

        // "spec" (test, 4 chars) vs "sql" (database, 3 chars)
        let broken = classifier.classify_detailed(&finding("spec sql", "nothing"));
        assert_eq!(broken.category, Category::TestFailure);
        assert!(!broken.ambiguous);
    }

    #[test]
    fn test_extra_lexicon_phrases() {
        let mut lexicon = BTreeMap::new();
        lexicon.insert("ui".to_string(), vec!["Tailwind Purge".to_string()]);
        let classifier = Classifier::new(ClassifierConfig {
            lexicon,
            ..ClassifierConfig::default()
        });
        let result = classifier.classify_detailed(&finding("tailwind purge drops classes", "x"));
        assert_eq!(result.category, Category::UiBug);
        assert_eq!(result.matched_phrases, vec!["tailwind purge".to_string()]);
    }

    #[test]
    fn test_deterministic() {
        let classifier = Classifier::default();
        let f = finding("Slow query on the orders index", "Add a composite index");
        let first = classifier.classify_detailed(&f);
        for _ in 0..10 {
            assert_eq!(classifier.classify_detailed(&f), first);
        }
    }
}
