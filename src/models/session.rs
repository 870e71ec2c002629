//! Session transcripts as supplied by the workflow collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of the session a finding came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Creates a new session ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single opaque text event of a session.
///
/// The engine never interprets the internal structure of an event beyond
/// treating it as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionEvent(String);

impl SessionEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Returns the event text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionEvent {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SessionEvent {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// An ordered sequence of session events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    /// Session the events belong to.
    pub session_id: SessionId,
    /// Events in the order they occurred.
    pub events: Vec<SessionEvent>,
    /// Free-text category hint supplied by the invoking user or agent.
    #[serde(default)]
    pub category_hint: Option<String>,
}

impl Transcript {
    /// Creates a transcript from events.
    #[must_use]
    pub fn new<I, E>(session_id: impl Into<SessionId>, events: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<SessionEvent>,
    {
        Self {
            session_id: session_id.into(),
            events: events.into_iter().map(Into::into).collect(),
            category_hint: None,
        }
    }

    /// Sets the category hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.category_hint = Some(hint.into());
        self
    }

    /// Returns true if there are no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_new_collects_events() {
        let transcript = Transcript::new("s-1", ["first", "second"]).with_hint("perf");
        assert_eq!(transcript.session_id.as_str(), "s-1");
        assert_eq!(transcript.events.len(), 2);
        assert_eq!(transcript.events[1].text(), "second");
        assert_eq!(transcript.category_hint.as_deref(), Some("perf"));
    }

    #[test]
    fn test_transcript_deserializes_without_hint() {
        let json = r#"{"session_id":"abc","events":["one"]}"#;
        let transcript: Transcript = serde_json::from_str(json).unwrap();
        assert!(transcript.category_hint.is_none());
        assert!(!transcript.is_empty());
    }
}
