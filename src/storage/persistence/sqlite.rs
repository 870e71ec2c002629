//! `SQLite`-based knowledge store.
//!
//! Provides durable storage using a single `SQLite` database file.

use crate::models::{Category, CriticalPattern, PatternId, SolutionDocument, SolutionId};
use crate::storage::traits::{PatternStore, SolutionStore};
use crate::storage::{pattern_not_found, solution_conflict, solution_not_found};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::instrument;

/// Columns selected for a solution row, in [`SolutionRow`] order.
const SOLUTION_COLUMNS: &str = "id, category, title, symptom, root_cause, fix, created_at, \
     updated_at, occurrence_count, source_refs, cross_refs, tags, revision";

/// `SQLite`-based knowledge store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access. `SQLite`'s WAL mode and
/// `busy_timeout` pragma mitigate contention from other processes:
///
/// - **WAL mode**: Allows concurrent readers with a single writer
/// - **`busy_timeout`**: Waits up to 5 seconds for locks instead of failing immediately
///
/// Compare-and-swap runs as `UPDATE ... WHERE revision = ?` inside an
/// immediate transaction. Pattern claims are rows in `pattern_claims`, keyed
/// by document ID, so a second claim on any cluster member violates the key.
///
/// # Schema
///
/// - `solutions`: one row per document; sets are stored as JSON arrays
/// - `patterns`: one row per critical pattern
/// - `pattern_claims`: document ID to claiming pattern ID
pub struct SqliteStore {
    /// Connection to the `SQLite` database.
    ///
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the `SQLite` database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Database file name used inside the data directory.
    pub const DEFAULT_FILE_NAME: &'static str = "compound.db";

    /// Opens (or creates) a database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = Connection::open(&db_path).map_err(|e| Error::operation("open_sqlite", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory database (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::operation("open_sqlite_in_memory", e))?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub const fn db_path(&self) -> Option<&PathBuf> {
        self.db_path.as_ref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn);

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS solutions (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                title TEXT NOT NULL,
                symptom TEXT NOT NULL,
                root_cause TEXT,
                fix TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                occurrence_count INTEGER NOT NULL,
                source_refs TEXT NOT NULL,
                cross_refs TEXT NOT NULL,
                tags TEXT NOT NULL,
                revision INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_solutions_category ON solutions(category);
            CREATE TABLE IF NOT EXISTS patterns (
                pattern_id TEXT PRIMARY KEY,
                source_document_id TEXT NOT NULL,
                statement TEXT NOT NULL,
                promoted_at TEXT NOT NULL,
                still_active INTEGER NOT NULL,
                cluster TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS pattern_claims (
                document_id TEXT PRIMARY KEY,
                pattern_id TEXT NOT NULL REFERENCES patterns(pattern_id)
            );",
        )
        .map_err(|e| Error::operation("create_schema", e))
    }

    /// Runs `f` inside an immediate transaction, committing on success.
    fn in_transaction<T>(
        conn: &Connection,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| Error::operation("begin_transaction", e))?;

        let result = f(conn);

        if result.is_ok() {
            conn.execute("COMMIT", [])
                .map_err(|e| Error::operation("commit_transaction", e))?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }
        result
    }

    fn query_solutions(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<SolutionDocument>> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::operation("prepare_list_solutions", e))?;
        let rows = stmt
            .query_map(params, SolutionRow::from_row)
            .map_err(|e| Error::operation("list_solutions", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("read_solution_row", e))?;
        rows.into_iter().map(SolutionRow::into_document).collect()
    }

    fn stored_revision(conn: &Connection, id: &SolutionId) -> Result<Option<u64>> {
        conn.query_row(
            "SELECT revision FROM solutions WHERE id = ?1",
            params![id.as_str()],
            |row| row.get::<_, i64>(0),
        )
        .optional()
        .map(|rev| rev.map(to_u64))
        .map_err(|e| Error::operation("read_revision", e))
    }

    fn insert_solution(conn: &Connection, doc: &SolutionDocument) -> Result<()> {
        let encoded = EncodedSolution::new(doc)?;
        conn.execute(
            &format!(
                "INSERT INTO solutions ({SOLUTION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
            ),
            params![
                doc.id.as_str(),
                doc.category.as_str(),
                doc.title,
                doc.symptom,
                doc.root_cause,
                doc.fix,
                encoded.created_at,
                encoded.updated_at,
                doc.occurrence_count,
                encoded.source_refs,
                encoded.cross_refs,
                encoded.tags,
                to_i64(doc.revision),
            ],
        )
        .map_err(|e| Error::operation("insert_solution", e))?;
        Ok(())
    }

    /// Overwrites a row only if its revision still matches `expected`.
    ///
    /// Returns the number of rows changed (0 when the revision moved on).
    fn update_solution(conn: &Connection, doc: &SolutionDocument, expected: u64) -> Result<usize> {
        let encoded = EncodedSolution::new(doc)?;
        conn.execute(
            "UPDATE solutions SET category = ?2, title = ?3, symptom = ?4, root_cause = ?5,
                fix = ?6, created_at = ?7, updated_at = ?8, occurrence_count = ?9,
                source_refs = ?10, cross_refs = ?11, tags = ?12, revision = ?13
             WHERE id = ?1 AND revision = ?14",
            params![
                doc.id.as_str(),
                doc.category.as_str(),
                doc.title,
                doc.symptom,
                doc.root_cause,
                doc.fix,
                encoded.created_at,
                encoded.updated_at,
                doc.occurrence_count,
                encoded.source_refs,
                encoded.cross_refs,
                encoded.tags,
                to_i64(doc.revision),
                to_i64(expected),
            ],
        )
        .map_err(|e| Error::operation("update_solution", e))
    }

    fn write_pattern(conn: &Connection, pattern: &CriticalPattern) -> Result<()> {
        let cluster = to_json(&pattern.cluster)?;
        conn.execute(
            "INSERT OR REPLACE INTO patterns
                (pattern_id, source_document_id, statement, promoted_at, still_active, cluster)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                pattern.pattern_id.as_str(),
                pattern.source_document_id.as_str(),
                pattern.statement,
                pattern.promoted_at.to_rfc3339(),
                pattern.still_active,
                cluster,
            ],
        )
        .map_err(|e| Error::operation("insert_pattern", e))?;
        Ok(())
    }

    fn read_pattern(conn: &Connection, id: &PatternId) -> Result<Option<CriticalPattern>> {
        conn.query_row(
            "SELECT pattern_id, source_document_id, statement, promoted_at, still_active, cluster
             FROM patterns WHERE pattern_id = ?1",
            params![id.as_str()],
            PatternRow::from_row,
        )
        .optional()
        .map_err(|e| Error::operation("get_pattern", e))?
        .map(PatternRow::into_pattern)
        .transpose()
    }
}

impl SolutionStore for SqliteStore {
    #[instrument(skip(self), fields(backend = "sqlite", solution.id = %id))]
    fn get(&self, id: &SolutionId) -> Result<SolutionDocument> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            let row = conn
                .query_row(
                    &format!("SELECT {SOLUTION_COLUMNS} FROM solutions WHERE id = ?1"),
                    params![id.as_str()],
                    SolutionRow::from_row,
                )
                .optional()
                .map_err(|e| Error::operation("get_solution", e))?;
            row.map_or_else(|| Err(solution_not_found(id)), SolutionRow::into_document)
        })();

        record_operation_metrics("get", start, &result);
        result
    }

    #[instrument(skip(self, doc), fields(backend = "sqlite", solution.id = %doc.id))]
    fn put(&self, doc: &SolutionDocument) -> Result<SolutionDocument> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            Self::in_transaction(&conn, |conn| {
                let current = Self::stored_revision(conn, &doc.id)?;
                let mut stored = doc.clone();
                stored.revision = current.map_or(1, |r| r + 1);
                match current {
                    Some(rev) => {
                        Self::update_solution(conn, &stored, rev)?;
                    },
                    None => Self::insert_solution(conn, &stored)?,
                }
                Ok(stored)
            })
        })();

        record_operation_metrics("put", start, &result);
        result
    }

    #[instrument(skip(self, doc), fields(backend = "sqlite", solution.id = %doc.id))]
    fn compare_and_put(
        &self,
        doc: &SolutionDocument,
        expected: Option<u64>,
    ) -> Result<SolutionDocument> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            Self::in_transaction(&conn, |conn| {
                let mut stored = doc.clone();
                match expected {
                    None => {
                        if Self::stored_revision(conn, &doc.id)?.is_some() {
                            return Err(solution_conflict(&doc.id));
                        }
                        stored.revision = 1;
                        Self::insert_solution(conn, &stored)?;
                    },
                    Some(rev) => {
                        stored.revision = rev + 1;
                        if Self::update_solution(conn, &stored, rev)? == 0 {
                            return Err(solution_conflict(&doc.id));
                        }
                    },
                }
                Ok(stored)
            })
        })();

        record_operation_metrics("compare_and_put", start, &result);
        result
    }

    #[instrument(skip(self), fields(backend = "sqlite"))]
    fn list(&self, category: Category) -> Result<Vec<SolutionDocument>> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            Self::query_solutions(
                &conn,
                &format!(
                    "SELECT {SOLUTION_COLUMNS} FROM solutions WHERE category = ?1 ORDER BY id"
                ),
                params![category.as_str()],
            )
        })();

        record_operation_metrics("list", start, &result);
        result
    }

    fn all(&self) -> Result<Vec<SolutionDocument>> {
        let conn = acquire_lock(&self.conn);
        Self::query_solutions(
            &conn,
            &format!("SELECT {SOLUTION_COLUMNS} FROM solutions ORDER BY id"),
            [],
        )
    }

    fn count(&self) -> Result<usize> {
        let conn = acquire_lock(&self.conn);
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM solutions", [], |row| row.get(0))
            .map_err(|e| Error::operation("count_solutions", e))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl PatternStore for SqliteStore {
    fn get_pattern(&self, id: &PatternId) -> Result<CriticalPattern> {
        let conn = acquire_lock(&self.conn);
        Self::read_pattern(&conn, id)?.ok_or_else(|| pattern_not_found(id))
    }

    fn patterns(&self) -> Result<Vec<CriticalPattern>> {
        let conn = acquire_lock(&self.conn);
        let mut stmt = conn
            .prepare(
                "SELECT pattern_id, source_document_id, statement, promoted_at, still_active, cluster
                 FROM patterns ORDER BY pattern_id",
            )
            .map_err(|e| Error::operation("prepare_list_patterns", e))?;
        let rows = stmt
            .query_map([], PatternRow::from_row)
            .map_err(|e| Error::operation("list_patterns", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::operation("read_pattern_row", e))?;
        rows.into_iter().map(PatternRow::into_pattern).collect()
    }

    #[instrument(skip(self, pattern), fields(backend = "sqlite", pattern.id = %pattern.pattern_id))]
    fn insert_pattern_if_unclaimed(&self, pattern: &CriticalPattern) -> Result<bool> {
        let start = Instant::now();
        let result = (|| {
            let conn = acquire_lock(&self.conn);
            Self::in_transaction(&conn, |conn| {
                let members: Vec<&SolutionId> = pattern
                    .cluster
                    .iter()
                    .chain(std::iter::once(&pattern.source_document_id))
                    .collect();

                for id in &members {
                    let claimed = conn
                        .query_row(
                            "SELECT 1 FROM pattern_claims WHERE document_id = ?1",
                            params![id.as_str()],
                            |_| Ok(()),
                        )
                        .optional()
                        .map_err(|e| Error::operation("check_pattern_claim", e))?
                        .is_some();
                    if claimed {
                        return Ok(false);
                    }
                }

                Self::write_pattern(conn, pattern)?;
                for id in members {
                    conn.execute(
                        "INSERT OR IGNORE INTO pattern_claims (document_id, pattern_id)
                         VALUES (?1, ?2)",
                        params![id.as_str(), pattern.pattern_id.as_str()],
                    )
                    .map_err(|e| Error::operation("insert_pattern_claim", e))?;
                }
                Ok(true)
            })
        })();

        record_operation_metrics("insert_pattern", start, &result);
        result
    }

    fn demote_pattern(&self, id: &PatternId) -> Result<CriticalPattern> {
        let conn = acquire_lock(&self.conn);
        conn.execute(
            "UPDATE patterns SET still_active = 0 WHERE pattern_id = ?1",
            params![id.as_str()],
        )
        .map_err(|e| Error::operation("demote_pattern", e))?;
        Self::read_pattern(&conn, id)?.ok_or_else(|| pattern_not_found(id))
    }
}

/// Raw `solutions` row.
struct SolutionRow {
    id: String,
    category: String,
    title: String,
    symptom: String,
    root_cause: Option<String>,
    fix: String,
    created_at: String,
    updated_at: String,
    occurrence_count: u32,
    source_refs: String,
    cross_refs: String,
    tags: String,
    revision: i64,
}

impl SolutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            category: row.get(1)?,
            title: row.get(2)?,
            symptom: row.get(3)?,
            root_cause: row.get(4)?,
            fix: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
            occurrence_count: row.get(8)?,
            source_refs: row.get(9)?,
            cross_refs: row.get(10)?,
            tags: row.get(11)?,
            revision: row.get(12)?,
        })
    }

    fn into_document(self) -> Result<SolutionDocument> {
        let category = Category::parse(&self.category).ok_or_else(|| {
            Error::InvalidInput(format!("Unknown category in store: {}", self.category))
        })?;
        Ok(SolutionDocument {
            id: SolutionId::new(self.id),
            category,
            title: self.title,
            symptom: self.symptom,
            root_cause: self.root_cause,
            fix: self.fix,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            occurrence_count: self.occurrence_count,
            source_refs: from_json(&self.source_refs)?,
            cross_refs: from_json(&self.cross_refs)?,
            tags: from_json(&self.tags)?,
            revision: to_u64(self.revision),
        })
    }
}

/// Serialized columns of a solution document.
struct EncodedSolution {
    created_at: String,
    updated_at: String,
    source_refs: String,
    cross_refs: String,
    tags: String,
}

impl EncodedSolution {
    fn new(doc: &SolutionDocument) -> Result<Self> {
        Ok(Self {
            created_at: doc.created_at.to_rfc3339(),
            updated_at: doc.updated_at.to_rfc3339(),
            source_refs: to_json(&doc.source_refs)?,
            cross_refs: to_json(&doc.cross_refs)?,
            tags: to_json(&doc.tags)?,
        })
    }
}

/// Raw `patterns` row.
struct PatternRow {
    pattern_id: String,
    source_document_id: String,
    statement: String,
    promoted_at: String,
    still_active: bool,
    cluster: String,
}

impl PatternRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pattern_id: row.get(0)?,
            source_document_id: row.get(1)?,
            statement: row.get(2)?,
            promoted_at: row.get(3)?,
            still_active: row.get(4)?,
            cluster: row.get(5)?,
        })
    }

    fn into_pattern(self) -> Result<CriticalPattern> {
        Ok(CriticalPattern {
            pattern_id: PatternId::new(self.pattern_id),
            source_document_id: SolutionId::new(self.source_document_id),
            statement: self.statement,
            promoted_at: parse_timestamp(&self.promoted_at)?,
            still_active: self.still_active,
            cluster: from_json(&self.cluster)?,
        })
    }
}

/// Helper to acquire the connection lock with poison recovery.
///
/// A panic in a previous critical section leaves the connection usable, so
/// the inner value is recovered and the event logged.
fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("compound_sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Applies WAL journaling, NORMAL sync and a 5 second busy timeout.
fn configure_connection(conn: &Connection) {
    // journal_mode returns a row, so pragma results are ignored
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
}

/// Records `compound_storage_operations_total` and
/// `compound_storage_operation_duration_ms` for an operation.
fn record_operation_metrics<T>(operation: &'static str, start: Instant, result: &Result<T>) {
    let status = match result {
        Ok(_) => "success",
        Err(e) if e.is_not_found() => "not_found",
        Err(e) if e.is_conflict() => "conflict",
        Err(_) => "error",
    };
    metrics::counter!(
        "compound_storage_operations_total",
        "backend" => "sqlite",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "compound_storage_operation_duration_ms",
        "backend" => "sqlite",
        "operation" => operation
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::operation("serialize_column", e))
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|e| Error::operation("deserialize_column", e))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::operation("parse_timestamp", e))
}

// Revisions stay far below i64::MAX; rusqlite has no u64 ToSql.
#[allow(clippy::cast_possible_wrap)]
const fn to_i64(value: u64) -> i64 {
    value as i64
}

#[allow(clippy::cast_sign_loss)]
const fn to_u64(value: i64) -> u64 {
    value as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Finding;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn create_test_doc(id: &str) -> SolutionDocument {
        let finding = Finding::new("s-1", "Login returns 500", "Handle the nil session")
            .with_keywords(["login", "session"]);
        let category = SolutionId::new(id).category().unwrap_or_default();
        SolutionDocument::from_finding(SolutionId::new(id), category, &finding, Utc::now())
    }

    fn create_test_pattern(id: &str, cluster: &[&str]) -> CriticalPattern {
        CriticalPattern {
            pattern_id: PatternId::new(id),
            source_document_id: SolutionId::new(cluster[0]),
            statement: "Handle the nil session".to_string(),
            promoted_at: Utc::now(),
            still_active: true,
            cluster: cluster.iter().map(|s| SolutionId::new(*s)).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn test_store_and_get() {
        let store = SqliteStore::in_memory().unwrap();
        let doc = create_test_doc("runtime-error-0000000000000001");

        let stored = store.put(&doc).unwrap();
        assert_eq!(stored.revision, 1);

        let retrieved = store.get(&doc.id).unwrap();
        assert_eq!(retrieved.symptom, "Login returns 500");
        assert_eq!(retrieved.category, Category::RuntimeError);
        assert_eq!(retrieved.tags, doc.tags);
        assert_eq!(retrieved.source_refs, doc.source_refs);
        assert_eq!(retrieved.created_at.timestamp(), doc.created_at.timestamp());
    }

    #[test]
    fn test_get_nonexistent() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.get(&SolutionId::new("decision-x")).unwrap_err().is_not_found());
    }

    #[test]
    fn test_compare_and_put_revisions() {
        let store = SqliteStore::in_memory().unwrap();
        let doc = create_test_doc("runtime-error-0000000000000002");

        let stored = store.compare_and_put(&doc, None).unwrap();
        assert!(store.compare_and_put(&doc, None).unwrap_err().is_conflict());

        let mut updated = stored.clone();
        updated.occurrence_count = 2;
        let updated = store.compare_and_put(&updated, Some(1)).unwrap();
        assert_eq!(updated.revision, 2);
        assert!(store.compare_and_put(&stored, Some(1)).unwrap_err().is_conflict());
        assert!(
            store
                .compare_and_put(&create_test_doc("decision-new"), Some(1))
                .unwrap_err()
                .is_conflict()
        );

        assert_eq!(store.get(&doc.id).unwrap().occurrence_count, 2);
    }

    #[test]
    fn test_list_and_count() {
        let store = SqliteStore::in_memory().unwrap();
        store.put(&create_test_doc("decision-2")).unwrap();
        store.put(&create_test_doc("decision-1")).unwrap();
        store.put(&create_test_doc("ui-bug-1")).unwrap();

        let decisions = store.list(Category::Decision).unwrap();
        assert_eq!(
            decisions.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["decision-1", "decision-2"]
        );
        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.all().unwrap().len(), 3);
    }

    #[test]
    fn test_pattern_claims() {
        let store = SqliteStore::in_memory().unwrap();
        let first = create_test_pattern("cp-1", &["decision-1", "decision-2"]);
        assert!(store.insert_pattern_if_unclaimed(&first).unwrap());

        let overlapping = create_test_pattern("cp-2", &["decision-2", "decision-3"]);
        assert!(!store.insert_pattern_if_unclaimed(&overlapping).unwrap());

        let disjoint = create_test_pattern("cp-3", &["decision-4"]);
        assert!(store.insert_pattern_if_unclaimed(&disjoint).unwrap());

        assert_eq!(store.patterns().unwrap().len(), 2);
    }

    #[test]
    fn test_demoted_pattern_still_claims_cluster() {
        let store = SqliteStore::in_memory().unwrap();
        let pattern = create_test_pattern("cp-1", &["decision-1"]);
        store.insert_pattern_if_unclaimed(&pattern).unwrap();

        let demoted = store.demote_pattern(&pattern.pattern_id).unwrap();
        assert!(!demoted.still_active);
        assert!(store.active_patterns().unwrap().is_empty());

        let again = create_test_pattern("cp-2", &["decision-1"]);
        assert!(!store.insert_pattern_if_unclaimed(&again).unwrap());
        assert!(
            store
                .demote_pattern(&PatternId::new("cp-missing"))
                .unwrap_err()
                .is_not_found()
        );
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(SqliteStore::DEFAULT_FILE_NAME);
        {
            let store = SqliteStore::new(&path).unwrap();
            store.put(&create_test_doc("decision-1")).unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.db_path(), Some(&path));
        assert_eq!(store.get(&SolutionId::new("decision-1")).unwrap().revision, 1);
    }
}
