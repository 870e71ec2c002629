//! Content hashing utility for deduplication.
//!
//! This module provides SHA256-based content addressing for solution
//! documents. Text is normalized before hashing so that equivalent findings
//! map to the same identifier despite formatting differences.

use crate::models::{Category, SolutionId};
use sha2::{Digest, Sha256};

/// Number of hex characters of the digest kept in a solution ID.
const ID_HASH_CHARS: usize = 16;

/// Content hasher for deduplication.
///
/// # Normalization
///
/// Before hashing, content is normalized:
/// - Converted to lowercase
/// - Every non-alphanumeric character replaced by a space
/// - Whitespace runs collapsed to single spaces, ends trimmed
///
/// # Example
///
/// ```rust
/// use compound::services::deduplication::ContentHasher;
/// use compound::Category;
///
/// let a = ContentHasher::solution_id(Category::RuntimeError, "Login returns 500!");
/// let b = ContentHasher::solution_id(Category::RuntimeError, "  login   RETURNS 500 ");
/// assert_eq!(a, b);
/// assert!(a.as_str().starts_with("runtime-error-"));
/// ```
pub struct ContentHasher;

impl ContentHasher {
    /// Derives the content-addressed ID of a `(category, symptom)` pair.
    ///
    /// The ID is `{category}-{16 hex chars}` where the hex is the prefix of
    /// `SHA-256(category + "\n" + normalized symptom)`.
    #[must_use]
    pub fn solution_id(category: Category, symptom: &str) -> SolutionId {
        let mut hasher = Sha256::new();
        hasher.update(category.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(Self::normalize(symptom).as_bytes());
        let digest = hex::encode(hasher.finalize());
        SolutionId::new(format!("{category}-{}", &digest[..ID_HASH_CHARS]))
    }

    /// Normalizes content for consistent hashing and comparison.
    ///
    /// # Example
    ///
    /// ```rust
    /// use compound::services::deduplication::ContentHasher;
    ///
    /// let normalized = ContentHasher::normalize("  N+1 query, in   Dashboard!");
    /// assert_eq!(normalized, "n 1 query in dashboard");
    /// ```
    #[must_use]
    pub fn normalize(content: &str) -> String {
        content
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_id_ignores_case_and_punctuation() {
        assert_eq!(
            ContentHasher::solution_id(Category::Decision, "Use PostgreSQL."),
            ContentHasher::solution_id(Category::Decision, "  use   postgresql ")
        );
        assert_ne!(
            ContentHasher::solution_id(Category::Decision, "Use PostgreSQL"),
            ContentHasher::solution_id(Category::Decision, "Use MySQL")
        );
    }

    #[test]
    fn test_normalize_function() {
        assert_eq!(ContentHasher::normalize("  Hello  "), "hello");
        assert_eq!(ContentHasher::normalize("Hello,World"), "hello world");
        assert_eq!(ContentHasher::normalize("line one\nline\ttwo"), "line one line two");
        assert_eq!(ContentHasher::normalize("!!!"), "");
    }

    #[test]
    fn test_unicode_content() {
        let normalized = ContentHasher::normalize("Use POSTGRESQL for 数据库");
        assert_eq!(normalized, "use postgresql for 数据库");
    }

    #[test]
    fn test_solution_id_format() {
        let id = ContentHasher::solution_id(Category::PerformanceIssue, "Dashboard is slow");
        let (prefix, hash) = id.as_str().rsplit_once('-').unwrap();
        assert_eq!(prefix, "performance-issue");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id.category(), Some(Category::PerformanceIssue));
    }

    #[test]
    fn test_solution_id_depends_on_category() {
        let a = ContentHasher::solution_id(Category::UiBug, "Button misaligned");
        let b = ContentHasher::solution_id(Category::Other, "Button misaligned");
        assert_ne!(a, b);
        assert_eq!(a.as_str()[a.as_str().len() - 16..].len(), 16);
    }

    #[test]
    fn test_solution_id_is_stable() {
        let id = ContentHasher::solution_id(Category::Decision, "Use UUIDv7 for ids");
        let again = ContentHasher::solution_id(Category::Decision, "use uuidv7 for IDs!");
        assert_eq!(id, again);
    }
}
