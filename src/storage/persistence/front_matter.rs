//! YAML front matter documents.
//!
//! Solution documents are stored as Markdown with a YAML header:
//! ```text
//! ---
//! id: performance-issue-0123456789abcdef
//! category: performance-issue
//! occurrence_count: 3
//! ---
//! # Dashboard is slow
//! ...
//! ```

use crate::{Error, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// The front matter delimiter.
const DELIMITER: &str = "---";

/// Splits a document into its typed front matter and Markdown body.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the header is missing, unterminated,
/// or not valid YAML for `T`.
pub fn parse<T: DeserializeOwned>(content: &str) -> Result<(T, String)> {
    let content = content.trim_start();
    let Some(after_first) = content.strip_prefix(DELIMITER) else {
        return Err(Error::InvalidInput(
            "Document has no front matter".to_string(),
        ));
    };
    let after_first = after_first.trim_start_matches(['\r', '\n']);

    let end_pos = find_closing(after_first).ok_or_else(|| {
        Error::InvalidInput("Front matter missing closing delimiter".to_string())
    })?;

    let yaml = &after_first[..end_pos];
    let body = after_first[end_pos + DELIMITER.len()..].trim_start_matches(['\r', '\n']);

    let metadata: T = serde_yaml_ng::from_str(yaml)
        .map_err(|e| Error::InvalidInput(format!("Invalid YAML front matter: {e}")))?;

    Ok((metadata, body.to_string()))
}

/// Renders typed metadata and a body as a front matter document.
///
/// # Errors
///
/// Returns an error if the metadata cannot be serialized.
pub fn render<T: Serialize>(metadata: &T, body: &str) -> Result<String> {
    let yaml = serde_yaml_ng::to_string(metadata).map_err(|e| Error::operation("serialize_yaml", e))?;
    Ok(format!("{DELIMITER}\n{yaml}{DELIMITER}\n{body}"))
}

/// Finds the closing delimiter, which must sit on its own line.
fn find_closing(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == DELIMITER {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}
