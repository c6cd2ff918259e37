//! Record store for accepted vocabulary entries.
//!
//! Production uses `SqliteStore`, where the `term` primary key provides the
//! cross-process uniqueness guarantee. `MemoryStore` is an in-process
//! stand-in with failure injection for exercising the acquisition loop.

use async_trait::async_trait;
use chrono::Utc;
use lexicon_shared::{StoreError, VocabularyEntry};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

/// How long a writer waits on a lock held by another connection
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Store Trait
// ============================================================================

/// Typed access to the persisted vocabulary set.
#[async_trait]
pub trait VocabStore: Send + Sync {
    /// All stored terms, in insertion order
    async fn all_terms(&self) -> Result<Vec<String>, StoreError>;

    async fn contains(&self, term: &str) -> Result<bool, StoreError>;

    /// Insert a new entry. Fails with `StoreError::Duplicate` when the term
    /// already exists; the existing row is left untouched.
    async fn insert(&self, entry: &VocabularyEntry) -> Result<(), StoreError>;

    async fn count(&self) -> Result<usize, StoreError>;
}

// ============================================================================
// SQLite Store (Production)
// ============================================================================

/// Vocabulary store backed by SQLite
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open or create the store at a specific path
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(|e| {
            StoreError::Backend(format!("Failed to open database {}: {}", path.display(), e))
        })?;

        let store = Self::from_connection(conn, Some(path.to_path_buf()))?;
        info!("Opened vocabulary store at {}", path.display());
        Ok(store)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(backend)?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(backend)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    /// Database file, if not in-memory
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run blocking SQLite work off the async runtime
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("store task failed: {}", e)))?
    }
}

/// Initialize the database schema
fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS words (
            term TEXT PRIMARY KEY NOT NULL CHECK (length(trim(term)) > 0),
            definition TEXT NOT NULL CHECK (length(trim(definition)) > 0),
            usages TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
        [],
    )
    .map_err(backend)?;
    Ok(())
}

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Map an INSERT failure, singling out primary-key conflicts
fn insert_error(term: &str, e: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, _) = e {
        if failure.code == ErrorCode::ConstraintViolation
            && (failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                || failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE)
        {
            return StoreError::Duplicate(term.to_string());
        }
    }
    backend(e)
}

#[async_trait]
impl VocabStore for SqliteStore {
    async fn all_terms(&self) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT term FROM words ORDER BY rowid")
                .map_err(backend)?;
            let terms = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(backend)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(backend)?;
            Ok(terms)
        })
        .await
    }

    async fn contains(&self, term: &str) -> Result<bool, StoreError> {
        let term = term.to_string();
        self.with_conn(move |conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM words WHERE term = ?", params![term], |row| {
                    row.get(0)
                })
                .optional()
                .map_err(backend)?;
            Ok(found.is_some())
        })
        .await
    }

    async fn insert(&self, entry: &VocabularyEntry) -> Result<(), StoreError> {
        entry.validate().map_err(StoreError::Invalid)?;

        let usages = serde_json::to_string(&entry.usages)
            .map_err(|e| StoreError::Backend(format!("Failed to encode usages: {}", e)))?;
        let entry = entry.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO words (term, definition, usages, created_at) VALUES (?, ?, ?, ?)",
                params![
                    &entry.term,
                    &entry.definition,
                    &usages,
                    Utc::now().to_rfc3339()
                ],
            )
            .map_err(|e| insert_error(&entry.term, e))?;
            debug!("Inserted term '{}'", entry.term);
            Ok(())
        })
        .await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))
                .map_err(backend)?;
            Ok(count as usize)
        })
        .await
    }
}

impl SqliteStore {
    /// Fetch a stored entry by term
    pub async fn get(&self, term: &str) -> Result<Option<VocabularyEntry>, StoreError> {
        let term = term.to_string();
        self.with_conn(move |conn| {
            let row: Option<(String, String, String)> = conn
                .query_row(
                    "SELECT term, definition, usages FROM words WHERE term = ?",
                    params![term],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(backend)?;

            row.map(|(term, definition, usages)| -> Result<VocabularyEntry, StoreError> {
                let usages: Vec<String> = serde_json::from_str(&usages)
                    .map_err(|e| StoreError::Backend(format!("Corrupt usages for '{}': {}", term, e)))?;
                Ok(VocabularyEntry {
                    term,
                    definition,
                    usages,
                })
            })
            .transpose()
        })
        .await
    }
}

// ============================================================================
// Memory Store (Testing)
// ============================================================================

#[derive(Default)]
struct MemoryState {
    entries: Vec<VocabularyEntry>,
    insert_attempts: usize,
    injected_errors: VecDeque<StoreError>,
    /// Terms another writer will claim right before our next insert of them
    races: HashSet<String>,
    unavailable: bool,
}

/// In-process store with failure injection
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds the given terms
    pub fn with_terms(terms: &[&str]) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock_state();
            for term in terms {
                state.entries.push(VocabularyEntry::new(
                    *term,
                    format!("definition of {}", term),
                    vec![format!("a sentence using {}", term)],
                ));
            }
        }
        store
    }

    /// Fail the next insert with `error`. Errors queue in call order.
    pub fn fail_next_insert(&self, error: StoreError) {
        self.lock_state().injected_errors.push_back(error);
    }

    /// Simulate another writer storing `term` between our existence check
    /// and our insert.
    pub fn race_on(&self, term: &str) {
        self.lock_state().races.insert(term.to_string());
    }

    /// Make every call fail with a backend error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock_state().unavailable = unavailable;
    }

    /// Number of insert calls received, successful or not
    pub fn insert_attempts(&self) -> usize {
        self.lock_state().insert_attempts
    }

    /// Snapshot of stored entries, in insertion order
    pub fn entries(&self) -> Vec<VocabularyEntry> {
        self.lock_state().entries.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(state: &MemoryState) -> Result<(), StoreError> {
        if state.unavailable {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VocabStore for MemoryStore {
    async fn all_terms(&self) -> Result<Vec<String>, StoreError> {
        let state = self.lock_state();
        Self::check_available(&state)?;
        Ok(state.entries.iter().map(|e| e.term.clone()).collect())
    }

    async fn contains(&self, term: &str) -> Result<bool, StoreError> {
        let state = self.lock_state();
        Self::check_available(&state)?;
        Ok(state.entries.iter().any(|e| e.term == term))
    }

    async fn insert(&self, entry: &VocabularyEntry) -> Result<(), StoreError> {
        let mut state = self.lock_state();
        state.insert_attempts += 1;
        Self::check_available(&state)?;

        if let Some(error) = state.injected_errors.pop_front() {
            return Err(error);
        }
        entry.validate().map_err(StoreError::Invalid)?;

        if state.races.remove(&entry.term) {
            state.entries.push(VocabularyEntry::new(
                entry.term.clone(),
                "stored by another writer",
                vec!["stored by another writer".to_string()],
            ));
        }

        if state.entries.iter().any(|e| e.term == entry.term) {
            return Err(StoreError::Duplicate(entry.term.clone()));
        }
        state.entries.push(entry.clone());
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let state = self.lock_state();
        Self::check_available(&state)?;
        Ok(state.entries.len())
    }
}
