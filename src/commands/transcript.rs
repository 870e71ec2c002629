//! Transcript file loading.
//!
//! Accepted formats:
//! - `.json`: either a full transcript object or an array of event strings
//! - anything else: plain text, one event per blank-line separated block

use anyhow::Context;
use compound::models::{SessionEvent, Transcript};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
#[serde(untagged)]
enum TranscriptFile {
    Full(Transcript),
    Events(Vec<String>),
}

/// Loads a transcript from disk.
///
/// `session` overrides the session ID; otherwise a JSON transcript keeps its
/// own ID and every other format uses the file stem.
pub fn load_transcript(
    path: &Path,
    session: Option<String>,
    hint: Option<String>,
) -> anyhow::Result<Transcript> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read transcript {}", path.display()))?;
    let fallback_session = session_from_path(path);

    let mut transcript = if is_json(path) {
        match serde_json::from_str::<TranscriptFile>(&contents)
            .with_context(|| format!("invalid transcript JSON in {}", path.display()))?
        {
            TranscriptFile::Full(transcript) => transcript,
            TranscriptFile::Events(events) => Transcript::new(fallback_session, events),
        }
    } else {
        Transcript::new(fallback_session, split_events(&contents))
    };

    if let Some(session) = session {
        transcript.session_id = session.into();
    }
    if hint.is_some() {
        transcript.category_hint = hint;
    }
    Ok(transcript)
}

/// Lists transcript files in a directory, sorted by path.
pub fn transcript_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
    {
        let path = entry?.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if path.is_file() && !hidden {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn split_events(contents: &str) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    let mut block: Vec<&str> = Vec::new();
    for line in contents.lines() {
        if line.trim().is_empty() {
            if !block.is_empty() {
                events.push(SessionEvent::new(block.join("\n")));
                block.clear();
            }
        } else {
            block.push(line);
        }
    }
    if !block.is_empty() {
        events.push(SessionEvent::new(block.join("\n")));
    }
    events
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

fn session_from_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map_or_else(|| "session".to_string(), ToString::to_string)
}
