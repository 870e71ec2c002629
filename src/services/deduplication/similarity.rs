//! Lexical similarity between findings and documents.
//!
//! Text similarity blends a token-set Jaccard score (stop words removed)
//! with a normalized Levenshtein score over the normalized text. Both the
//! deduplicator and the retriever use the same measure.

use super::ContentHasher;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum characters compared by the edit-distance component.
pub const MAX_EDIT_CHARS: usize = 256;

/// Minimum token length kept by [`tokenize`].
const MIN_TOKEN_CHARS: usize = 2;

/// Words ignored when building token sets.
pub const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "before", "but", "by", "can", "could", "did", "do", "does", "for", "from", "had", "has",
    "have", "how", "i", "if", "in", "into", "is", "it", "its", "just", "no", "not", "of", "on",
    "or", "our", "should", "so", "some", "than", "that", "the", "their", "them", "then", "there",
    "these", "this", "to", "too", "up", "us", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "why", "will", "with", "would", "you", "your",
];

/// Returns true if `word` is a stop word.
#[must_use]
pub fn is_stop_word(word: &str) -> bool {
    STOP_WORDS.binary_search(&word).is_ok()
}

/// Splits text into its normalized, stop-word-free token set.
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    ContentHasher::normalize(text)
        .split(' ')
        .filter(|w| w.chars().count() >= MIN_TOKEN_CHARS && !is_stop_word(w))
        .map(str::to_string)
        .collect()
}

/// Jaccard index of two token sets; 0 when both are empty.
#[must_use]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    #[allow(clippy::cast_precision_loss)]
    let score = intersection as f32 / union as f32;
    score
}

/// Precomputed comparison form of a piece of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    /// Normalized text, truncated to [`MAX_EDIT_CHARS`].
    normalized: String,
    /// Stop-word-free token set.
    tokens: BTreeSet<String>,
}

impl Fingerprint {
    /// Builds the fingerprint of `text`.
    #[must_use]
    pub fn new(text: &str) -> Self {
        let normalized: String = ContentHasher::normalize(text)
            .chars()
            .take(MAX_EDIT_CHARS)
            .collect();
        Self {
            normalized,
            tokens: tokenize(text),
        }
    }

    /// Returns the token set.
    #[must_use]
    pub const fn tokens(&self) -> &BTreeSet<String> {
        &self.tokens
    }

    /// Returns true if the two fingerprints share at least one token.
    #[must_use]
    pub fn shares_token(&self, other: &Self) -> bool {
        !self.tokens.is_disjoint(&other.tokens)
    }

    /// Normalized Levenshtein similarity; 0 if either side is empty.
    #[must_use]
    pub fn edit_similarity(&self, other: &Self) -> f32 {
        if self.normalized.is_empty() || other.normalized.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_possible_truncation)]
        let score = strsim::normalized_levenshtein(&self.normalized, &other.normalized) as f32;
        score
    }
}

/// Weights of the similarity measure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    /// Weight of the symptom score in a pair score; the fix gets the rest.
    pub symptom_weight: f32,
    /// Weight of Jaccard in a text score; edit similarity gets the rest.
    pub token_weight: f32,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            symptom_weight: 0.6,
            token_weight: 0.7,
        }
    }
}

impl SimilarityWeights {
    /// Similarity of two fingerprints in `[0, 1]`.
    #[must_use]
    pub fn text(&self, a: &Fingerprint, b: &Fingerprint) -> f32 {
        let token_score = jaccard(&a.tokens, &b.tokens);
        let edit_score = a.edit_similarity(b);
        self.token_weight
            .mul_add(token_score, (1.0 - self.token_weight) * edit_score)
            .clamp(0.0, 1.0)
    }

    /// Similarity of two (symptom, fix) pairs in `[0, 1]`.
    #[must_use]
    pub fn pair(&self, a: &PairFingerprint, b: &PairFingerprint) -> f32 {
        let symptom = self.text(&a.symptom, &b.symptom);
        let fix = self.text(&a.fix, &b.fix);
        self.symptom_weight
            .mul_add(symptom, (1.0 - self.symptom_weight) * fix)
            .clamp(0.0, 1.0)
    }
}

/// Fingerprints of a symptom and its fix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairFingerprint {
    /// Symptom fingerprint.
    pub symptom: Fingerprint,
    /// Fix fingerprint.
    pub fix: Fingerprint,
}

impl PairFingerprint {
    /// Builds the fingerprints of a symptom and fix.
    #[must_use]
    pub fn new(symptom: &str, fix: &str) -> Self {
        Self {
            symptom: Fingerprint::new(symptom),
            fix: Fingerprint::new(fix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_words_sorted_for_binary_search() {
        let mut sorted = STOP_WORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOP_WORDS);
        assert!(is_stop_word("the"));
        assert!(!is_stop_word("query"));
    }

    #[test]
    fn test_tokenize_drops_stop_words_and_short_tokens() {
        let tokens = tokenize("The N+1 query in the Dashboard");
        assert_eq!(
            tokens.into_iter().collect::<Vec<_>>(),
            vec!["dashboard".to_string(), "query".to_string()]
        );
    }

    #[test]
    fn test_jaccard() {
        let a = tokenize("slow dashboard query");
        let b = tokenize("slow widget query");
        assert!((jaccard(&a, &b) - 0.5).abs() < 1e-6);
        assert!(jaccard(&BTreeSet::new(), &BTreeSet::new()).abs() < f32::EPSILON);
    }

    #[test]
    fn test_identical_text_scores_one() {
        let weights = SimilarityWeights::default();
        let a = Fingerprint::new("Dashboard loads slowly");
        assert!((weights.text(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unrelated_text_scores_low() {
        let weights = SimilarityWeights::default();
        let a = Fingerprint::new("Dashboard loads slowly");
        let b = Fingerprint::new("Certificate expired yesterday");
        assert!(weights.text(&a, &b) < 0.3);
        assert!(!a.shares_token(&b));
    }

    #[test]
    fn test_edit_similarity_empty() {
        let empty = Fingerprint::new("!!");
        let text = Fingerprint::new("text");
        assert!(empty.edit_similarity(&text).abs() < f32::EPSILON);
        assert!(empty.edit_similarity(&empty).abs() < f32::EPSILON);
    }

    #[test]
    fn test_fingerprint_truncates_for_edit_distance() {
        let long = "word ".repeat(200);
        let fp = Fingerprint::new(&long);
        assert_eq!(fp.normalized.chars().count(), MAX_EDIT_CHARS);
    }

    #[test]
    fn test_pair_weights() {
        let weights = SimilarityWeights::default();
        let a = PairFingerprint::new("Dashboard loads slowly", "Add eager loading");
        let same_fix = PairFingerprint::new("Certificate expired yesterday", "Add eager loading");
        let score = weights.pair(&a, &same_fix);
        assert!(score >= 0.4 - 1e-6);
        assert!(score < 0.55);
    }
}
