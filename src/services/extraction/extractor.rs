//! Transcript to finding extraction.

use super::patterns::{matched_signals, role_score, strip_label};
use crate::models::{ExcerptRef, ExcerptRole, Extraction, Finding, Transcript};
use crate::services::deduplication::ContentHasher;
use crate::services::deduplication::similarity::is_stop_word;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;

/// Extraction limits.
///
/// Loaded from the `[extraction]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Largest accepted event, in bytes.
    pub max_event_bytes: usize,
    /// Finding fields are truncated to this many characters.
    pub max_field_chars: usize,
    /// Maximum number of keywords kept as tags.
    pub max_keywords: usize,
    /// Minimum role score for a segment to count as symptom/cause/fix.
    pub min_role_score: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_event_bytes: 1024 * 1024,
            max_field_chars: 500,
            max_keywords: 5,
            min_role_score: 2.0,
        }
    }
}

/// A scored piece of one event.
#[derive(Debug)]
struct Segment<'a> {
    event_index: usize,
    text: &'a str,
}

/// Extracts a structured finding from a session transcript.
///
/// Pure: the same transcript always yields the same extraction, and nothing
/// outside the return value is touched.
///
/// # Example
///
/// ```rust
/// use compound::{Extractor, Transcript};
///
/// let extractor = Extractor::default();
/// let transcript = Transcript::new("s-1", [
///     "Error: the dashboard times out when loading widgets",
///     "Fix: eager load widgets with includes(:widgets)",
/// ]);
/// let finding = extractor.extract(&transcript)?.into_finding().unwrap();
/// assert_eq!(finding.fix, "eager load widgets with includes(:widgets)");
/// # Ok::<(), compound::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Extractor {
    config: ExtractionConfig,
}

impl Extractor {
    /// Creates an extractor.
    #[must_use]
    pub const fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extracts a finding, or `NoFinding` when the session holds no
    /// symptom/fix pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Extraction`] if the transcript has no events, only
    /// blank events, or an event above `max_event_bytes`.
    #[instrument(
        skip(self, transcript),
        fields(operation = "extract", session = %transcript.session_id, events = transcript.events.len())
    )]
    pub fn extract(&self, transcript: &Transcript) -> Result<Extraction> {
        self.validate(transcript)?;

        let segments = segment_events(transcript);

        let Some((symptom_idx, fix_idx)) = self.best_pair(&segments) else {
            tracing::debug!("No symptom/fix pair found");
            return Ok(Extraction::NoFinding);
        };
        let cause_idx = self.strongest(&segments, ExcerptRole::RootCause, &[symptom_idx, fix_idx]);
        tracing::debug!(
            symptom_signals = ?matched_signals(segments[symptom_idx].text, ExcerptRole::Symptom),
            fix_signals = ?matched_signals(segments[fix_idx].text, ExcerptRole::Fix),
            "Selected finding segments"
        );

        let symptom = self.clean(segments[symptom_idx].text);
        let fix = self.clean(segments[fix_idx].text);
        if symptom.is_empty() || fix.is_empty() {
            return Ok(Extraction::NoFinding);
        }

        let mut evidence: Vec<(usize, ExcerptRef)> = [
            Some((symptom_idx, ExcerptRole::Symptom)),
            cause_idx.map(|i| (i, ExcerptRole::RootCause)),
            Some((fix_idx, ExcerptRole::Fix)),
        ]
        .into_iter()
        .flatten()
        .map(|(idx, role)| {
            let segment = &segments[idx];
            (
                idx,
                ExcerptRef {
                    event_index: segment.event_index,
                    role,
                    excerpt: segment.text.to_string(),
                },
            )
        })
        .collect();
        evidence.sort_by_key(|(idx, _)| *idx);

        let keywords = self.keywords(&symptom, &fix);
        let mut finding = Finding::new(transcript.session_id.clone(), symptom, fix)
            .with_keywords(keywords);
        finding.root_cause = cause_idx
            .map(|i| self.clean(segments[i].text))
            .filter(|c| !c.is_empty());
        finding.evidence = evidence.into_iter().map(|(_, e)| e).collect();
        finding.category_hint.clone_from(&transcript.category_hint);

        tracing::debug!(
            symptom = %finding.symptom,
            has_root_cause = finding.root_cause.is_some(),
            "Extracted finding"
        );
        Ok(Extraction::Found(finding))
    }

    fn validate(&self, transcript: &Transcript) -> Result<()> {
        if transcript.is_empty() {
            return Err(Error::Extraction("transcript has no events".to_string()));
        }
        if let Some((index, event)) = transcript
            .events
            .iter()
            .enumerate()
            .find(|(_, e)| e.text().len() > self.config.max_event_bytes)
        {
            return Err(Error::Extraction(format!(
                "event {index} is {} bytes, above the {} byte limit",
                event.text().len(),
                self.config.max_event_bytes
            )));
        }
        if transcript.events.iter().all(|e| e.text().trim().is_empty()) {
            return Err(Error::Extraction("transcript has only blank events".to_string()));
        }
        Ok(())
    }

    /// The (symptom, fix) segment pair with the highest combined score.
    ///
    /// Both segments must reach `min_role_score` and must differ. Ties go to
    /// the earliest symptom, then the earliest fix.
    fn best_pair(&self, segments: &[Segment<'_>]) -> Option<(usize, usize)> {
        let scored = |role| -> Vec<(usize, f32)> {
            segments
                .iter()
                .enumerate()
                .map(|(idx, segment)| (idx, role_score(segment.text, role)))
                .filter(|(_, score)| *score >= self.config.min_role_score)
                .collect()
        };
        let symptoms = scored(ExcerptRole::Symptom);
        let fixes = scored(ExcerptRole::Fix);

        // Two strongest fixes suffice: one of them always differs from the symptom.
        let mut top_fixes: Vec<(usize, f32)> = Vec::with_capacity(2);
        for &(idx, score) in &fixes {
            match top_fixes.iter().position(|&(_, top)| score > top) {
                Some(pos) => top_fixes.insert(pos, (idx, score)),
                None => top_fixes.push((idx, score)),
            }
            top_fixes.truncate(2);
        }

        let mut best: Option<(usize, usize, f32)> = None;
        for &(symptom_idx, symptom_score) in &symptoms {
            let Some(&(fix_idx, fix_score)) = top_fixes.iter().find(|(idx, _)| *idx != symptom_idx)
            else {
                continue;
            };
            let total = symptom_score + fix_score;
            if best.is_none_or(|(_, _, top)| total > top) {
                best = Some((symptom_idx, fix_idx, total));
            }
        }
        best.map(|(symptom_idx, fix_idx, _)| (symptom_idx, fix_idx))
    }

    /// Index of the highest-scoring segment for `role`, earliest on ties.
    fn strongest(&self, segments: &[Segment<'_>], role: ExcerptRole, exclude: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (idx, segment) in segments.iter().enumerate() {
            if exclude.contains(&idx) {
                continue;
            }
            let score = role_score(segment.text, role);
            if score < self.config.min_role_score {
                continue;
            }
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Strips the label, collapses whitespace, and caps the length.
    fn clean(&self, text: &str) -> String {
        strip_label(text)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(self.config.max_field_chars)
            .collect()
    }

    /// Most frequent non-stop-words of symptom and fix, first seen on ties.
    fn keywords(&self, symptom: &str, fix: &str) -> Vec<String> {
        let text = ContentHasher::normalize(&format!("{symptom} {fix}"));
        let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
        for (position, word) in text.split(' ').enumerate() {
            if word.chars().count() < 3 || is_stop_word(word) || word.chars().all(char::is_numeric) {
                continue;
            }
            counts.entry(word).or_insert((0, position)).0 += 1;
        }

        let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_b.cmp(count_a).then(first_a.cmp(first_b))
        });
        ranked
            .into_iter()
            .take(self.config.max_keywords)
            .map(|(word, _)| word.to_string())
            .collect()
    }
}

/// Splits every event into lines, then sentences.
fn segment_events(transcript: &Transcript) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    for (event_index, event) in transcript.events.iter().enumerate() {
        for line in event.text().lines() {
            for sentence in split_sentences(line) {
                let text = sentence.trim();
                if !text.is_empty() {
                    segments.push(Segment { event_index, text });
                }
            }
        }
    }
    segments
}

/// Splits after `.`, `!` or `?` when followed by whitespace.
fn split_sentences(line: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace())
        {
            let end = i + c.len_utf8();
            sentences.push(&line[start..end]);
            start = end;
        }
    }
    if start < line.len() {
        sentences.push(&line[start..]);
    }
    sentences
}
