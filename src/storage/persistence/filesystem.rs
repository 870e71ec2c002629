//! Filesystem-based knowledge store.
//!
//! Stores each solution document as a Markdown file with YAML front matter
//! under `solutions/<category>/<id>.md`, and each critical pattern as JSON
//! under `patterns/<pattern_id>.json`. The files are meant to be browsed and
//! committed alongside a project.
//!
//! # Security
//!
//! - **Path traversal**: IDs are validated before they become file names
//! - **File size limits**: files above 1 MiB are rejected on read
//!
//! # Concurrency
//!
//! Read-modify-write on a document holds a per-ID mutex for the whole
//! compare-and-swap, and pattern insertion holds a store-wide pattern
//! mutex. Writes go to a temporary file that is renamed into place, so
//! readers never observe a torn document. Locking is in-process only.

use super::front_matter;
use crate::models::{Category, CriticalPattern, PatternId, SolutionDocument, SolutionId};
use crate::storage::traits::{PatternStore, SolutionStore};
use crate::storage::{is_claimed, next_revision, pattern_not_found, solution_not_found};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::instrument;

/// Maximum file size for stored files (1MB).
const MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Directory holding solution documents.
const SOLUTIONS_DIR: &str = "solutions";

/// Directory holding critical patterns.
const PATTERNS_DIR: &str = "patterns";

/// Filesystem-based knowledge store.
#[derive(Debug)]
pub struct FilesystemStore {
    /// Base directory for storage.
    base_path: PathBuf,
    /// Per-document write locks.
    locks: Mutex<HashMap<SolutionId, Arc<Mutex<()>>>>,
    /// Serializes pattern claims.
    pattern_lock: Mutex<()>,
}

impl FilesystemStore {
    /// Creates a store rooted at `base_path`, creating the directory tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the directories cannot be created.
    pub fn with_create(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();

        for dir in [SOLUTIONS_DIR, PATTERNS_DIR] {
            fs::create_dir_all(base_path.join(dir))
                .map_err(|e| Error::operation("create_storage_dir", e))?;
        }

        Ok(Self {
            base_path,
            locks: Mutex::new(HashMap::new()),
            pattern_lock: Mutex::new(()),
        })
    }

    /// Returns the base path.
    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the path for a solution document.
    ///
    /// The category directory is recovered from the ID prefix; IDs without
    /// a recognizable category cannot name a file.
    fn solution_path(&self, id: &SolutionId) -> Result<PathBuf> {
        let id_str = id.as_str();
        if !is_safe_filename(id_str) {
            return Err(Error::InvalidInput(format!(
                "Solution ID contains invalid characters: {id_str}",
            )));
        }
        let category = id.category().ok_or_else(|| {
            Error::InvalidInput(format!("Solution ID has no category prefix: {id_str}"))
        })?;

        Ok(self
            .category_dir(category)
            .join(format!("{id_str}.md")))
    }

    fn category_dir(&self, category: Category) -> PathBuf {
        self.base_path.join(SOLUTIONS_DIR).join(category.as_str())
    }

    fn pattern_path(&self, id: &PatternId) -> Result<PathBuf> {
        let id_str = id.as_str();
        if !is_safe_filename(id_str) {
            return Err(Error::InvalidInput(format!(
                "Pattern ID contains invalid characters: {id_str}",
            )));
        }
        Ok(self.base_path.join(PATTERNS_DIR).join(format!("{id_str}.json")))
    }

    /// Returns the write lock for a document, creating it on first use.
    fn lock_for(&self, id: &SolutionId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::operation("lock_registry", "Lock poisoned"))?;
        Ok(Arc::clone(locks.entry(id.clone()).or_default()))
    }

    fn read_solution(path: &Path) -> Result<SolutionDocument> {
        let content = read_capped(path)?;
        let (doc, _body): (SolutionDocument, String) = front_matter::parse(&content)?;
        Ok(doc)
    }

    fn read_stored_revision(&self, id: &SolutionId) -> Result<Option<u64>> {
        let path = self.solution_path(id)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_solution(&path)?.revision))
    }

    fn write_solution(&self, doc: &SolutionDocument) -> Result<()> {
        let path = self.solution_path(&doc.id)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| Error::operation("create_category_dir", e))?;
        }
        let content = front_matter::render(doc, &render_body(doc))?;
        write_atomic(&path, content.as_bytes())
    }

    fn read_dir_solutions(dir: &Path, out: &mut Vec<SolutionDocument>) -> Result<()> {
        if !dir.exists() {
            return Ok(());
        }
        let entries = fs::read_dir(dir).map_err(|e| Error::operation("read_storage_dir", e))?;
        for entry in entries {
            let path = entry
                .map_err(|e| Error::operation("read_dir_entry", e))?
                .path();
            if path.extension().is_none_or(|ext| ext != "md") {
                continue;
            }
            match Self::read_solution(&path) {
                Ok(doc) => out.push(doc),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable solution file");
                },
            }
        }
        Ok(())
    }

    fn pattern_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.pattern_lock
            .lock()
            .map_err(|_| Error::operation("lock_patterns", "Lock poisoned"))
    }

    fn write_pattern(&self, pattern: &CriticalPattern) -> Result<()> {
        let path = self.pattern_path(&pattern.pattern_id)?;
        let json = serde_json::to_string_pretty(pattern)
            .map_err(|e| Error::operation("serialize_pattern", e))?;
        write_atomic(&path, json.as_bytes())
    }

    fn read_pattern(path: &Path) -> Result<CriticalPattern> {
        let content = read_capped(path)?;
        serde_json::from_str(&content).map_err(|e| Error::operation("deserialize_pattern", e))
    }
}

/// Checks if a filename is safe (no path traversal).
fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Reads a file after checking it against the size cap.
fn read_capped(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path).map_err(|e| Error::operation("read_file_metadata", e))?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(Error::InvalidInput(format!(
            "File exceeds maximum size of {MAX_FILE_SIZE} bytes: {}",
            path.display()
        )));
    }
    fs::read_to_string(path).map_err(|e| Error::operation("read_file", e))
}

/// Writes a file through a temporary sibling and an atomic rename.
///
/// Data above the read cap is refused so every stored file stays readable.
fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if data.len() as u64 > MAX_FILE_SIZE {
        tracing::warn!(path = %path.display(), bytes = data.len(), "Refusing oversized write");
        return Err(Error::InvalidInput(format!(
            "Content of {} bytes exceeds maximum size of {MAX_FILE_SIZE} bytes: {}",
            data.len(),
            path.display()
        )));
    }
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp, data).map_err(|e| Error::operation("write_temp_file", e))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        Error::operation("rename_temp_file", e)
    })
}

/// Renders the human-readable Markdown body of a document.
fn render_body(doc: &SolutionDocument) -> String {
    let mut body = format!("# {}\n\n## Symptom\n\n{}\n", doc.title, doc.symptom);
    if let Some(root_cause) = &doc.root_cause {
        body.push_str(&format!("\n## Root cause\n\n{root_cause}\n"));
    }
    body.push_str(&format!("\n## Fix\n\n{}\n", doc.fix));
    if !doc.cross_refs.is_empty() {
        body.push_str("\n## Related\n\n");
        for id in &doc.cross_refs {
            body.push_str(&format!("- {id}\n"));
        }
    }
    body
}

impl SolutionStore for FilesystemStore {
    fn get(&self, id: &SolutionId) -> Result<SolutionDocument> {
        let Ok(path) = self.solution_path(id) else {
            return Err(solution_not_found(id));
        };
        if !path.exists() {
            return Err(solution_not_found(id));
        }
        Self::read_solution(&path)
    }

    #[instrument(skip(self, doc), fields(backend = "filesystem", solution.id = %doc.id))]
    fn put(&self, doc: &SolutionDocument) -> Result<SolutionDocument> {
        let lock = self.lock_for(&doc.id)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::operation("lock_solution", "Lock poisoned"))?;

        let current = self.read_stored_revision(&doc.id)?;
        let mut stored = doc.clone();
        stored.revision = current.map_or(1, |r| r + 1);
        self.write_solution(&stored)?;
        Ok(stored)
    }

    #[instrument(skip(self, doc), fields(backend = "filesystem", solution.id = %doc.id))]
    fn compare_and_put(
        &self,
        doc: &SolutionDocument,
        expected: Option<u64>,
    ) -> Result<SolutionDocument> {
        let lock = self.lock_for(&doc.id)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::operation("lock_solution", "Lock poisoned"))?;

        let current = self.read_stored_revision(&doc.id)?;
        let mut stored = doc.clone();
        stored.revision = next_revision(&doc.id, current, expected)?;
        self.write_solution(&stored)?;
        Ok(stored)
    }

    fn list(&self, category: Category) -> Result<Vec<SolutionDocument>> {
        let mut docs = Vec::new();
        Self::read_dir_solutions(&self.category_dir(category), &mut docs)?;
        docs.retain(|d| d.category == category);
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    fn all(&self) -> Result<Vec<SolutionDocument>> {
        let mut docs = Vec::new();
        for category in Category::all() {
            Self::read_dir_solutions(&self.category_dir(*category), &mut docs)?;
        }
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }
}

impl PatternStore for FilesystemStore {
    fn get_pattern(&self, id: &PatternId) -> Result<CriticalPattern> {
        let Ok(path) = self.pattern_path(id) else {
            return Err(pattern_not_found(id));
        };
        if !path.exists() {
            return Err(pattern_not_found(id));
        }
        Self::read_pattern(&path)
    }

    fn patterns(&self) -> Result<Vec<CriticalPattern>> {
        let dir = self.base_path.join(PATTERNS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|e| Error::operation("read_patterns_dir", e))?;

        let mut patterns = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| Error::operation("read_dir_entry", e))?
                .path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            patterns.push(Self::read_pattern(&path)?);
        }
        patterns.sort_by(|a, b| a.pattern_id.cmp(&b.pattern_id));
        Ok(patterns)
    }

    #[instrument(skip(self, pattern), fields(backend = "filesystem", pattern.id = %pattern.pattern_id))]
    fn insert_pattern_if_unclaimed(&self, pattern: &CriticalPattern) -> Result<bool> {
        let _guard = self.pattern_guard()?;
        if is_claimed(&self.patterns()?, pattern) {
            return Ok(false);
        }
        self.write_pattern(pattern)?;
        Ok(true)
    }

    fn demote_pattern(&self, id: &PatternId) -> Result<CriticalPattern> {
        let _guard = self.pattern_guard()?;
        let mut pattern = self.get_pattern(id)?;
        if pattern.still_active {
            pattern.still_active = false;
            self.write_pattern(&pattern)?;
        }
        Ok(pattern)
    }
}
