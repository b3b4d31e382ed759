//! SQLite storage backend for the integrity engine

use super::traits::{OpenStore, StorageError, StorageResult};
use super::unit_of_work::{run_in, UnitOfWork};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Busy timeout applied to every connection unless configured otherwise.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tables of the bibliographic/prosopographic graph.
///
/// Relations reference each other by id only: there are no `FOREIGN KEY`
/// clauses and no UNIQUE natural keys. Referential integrity is enforced by
/// the dependency guard and uniqueness by merge compaction.
const SCHEMA: &str = r#"
    -- Hierarchies
    CREATE TABLE IF NOT EXISTS content (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS office (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS region (
        id INTEGER PRIMARY KEY,
        parent_id INTEGER,
        name TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_content_parent ON content(parent_id);
    CREATE INDEX IF NOT EXISTS idx_office_parent ON office(parent_id);
    CREATE INDEX IF NOT EXISTS idx_region_parent ON region(parent_id);

    -- Documents and their owned rows
    CREATE TABLE IF NOT EXISTS document (
        id INTEGER PRIMARY KEY,
        document_type TEXT NOT NULL,
        shelfmark TEXT
    );
    CREATE TABLE IF NOT EXISTS document_title (
        id INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL,
        title TEXT NOT NULL,
        language TEXT
    );
    CREATE TABLE IF NOT EXISTS document_date (
        id INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL,
        date TEXT,
        interval INTEGER
    );
    CREATE TABLE IF NOT EXISTS translation (
        id INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL,
        language TEXT NOT NULL,
        body TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_document_title_document ON document_title(document_id);
    CREATE INDEX IF NOT EXISTS idx_document_date_document ON document_date(document_id);
    CREATE INDEX IF NOT EXISTS idx_translation_document ON translation(document_id);

    -- Entities
    CREATE TABLE IF NOT EXISTS person (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS place (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        region_id INTEGER
    );
    CREATE TABLE IF NOT EXISTS bib (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        bib_type TEXT NOT NULL,
        parent_id INTEGER
    );
    CREATE TABLE IF NOT EXISTS role (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS authority (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        multi_volume INTEGER NOT NULL DEFAULT 0
    );
    CREATE INDEX IF NOT EXISTS idx_place_region ON place(region_id);
    CREATE INDEX IF NOT EXISTS idx_bib_parent ON bib(parent_id);

    -- Edges
    CREATE TABLE IF NOT EXISTS document_content (
        id INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL,
        content_id INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS document_place (
        id INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL,
        place_id INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS document_reference (
        id INTEGER PRIMARY KEY,
        source_id INTEGER NOT NULL,
        target_id INTEGER NOT NULL,
        reference_type TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS document_bib (
        id INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL,
        bib_id INTEGER NOT NULL,
        pages TEXT
    );
    CREATE TABLE IF NOT EXISTS document_person (
        id INTEGER PRIMARY KEY,
        document_id INTEGER NOT NULL,
        person_id INTEGER NOT NULL,
        role_id INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS person_office (
        id INTEGER PRIMARY KEY,
        person_id INTEGER NOT NULL,
        office_id INTEGER NOT NULL,
        place_id INTEGER
    );
    CREATE TABLE IF NOT EXISTS factoid (
        id INTEGER PRIMARY KEY,
        subject_id INTEGER NOT NULL,
        object_id INTEGER,
        date TEXT,
        interval INTEGER,
        location_id INTEGER,
        factoid_type TEXT NOT NULL,
        document_id INTEGER
    );
    CREATE TABLE IF NOT EXISTS global_id (
        id INTEGER PRIMARY KEY,
        authority_id INTEGER NOT NULL,
        subject_type TEXT NOT NULL,
        subject_id INTEGER NOT NULL,
        identifiers TEXT NOT NULL DEFAULT '[]'
    );
    CREATE INDEX IF NOT EXISTS idx_document_content_document ON document_content(document_id);
    CREATE INDEX IF NOT EXISTS idx_document_content_content ON document_content(content_id);
    CREATE INDEX IF NOT EXISTS idx_document_place_document ON document_place(document_id);
    CREATE INDEX IF NOT EXISTS idx_document_place_place ON document_place(place_id);
    CREATE INDEX IF NOT EXISTS idx_document_reference_source ON document_reference(source_id);
    CREATE INDEX IF NOT EXISTS idx_document_reference_target ON document_reference(target_id);
    CREATE INDEX IF NOT EXISTS idx_document_bib_document ON document_bib(document_id);
    CREATE INDEX IF NOT EXISTS idx_document_bib_bib ON document_bib(bib_id);
    CREATE INDEX IF NOT EXISTS idx_document_person_document ON document_person(document_id);
    CREATE INDEX IF NOT EXISTS idx_document_person_person ON document_person(person_id, document_id, role_id);
    CREATE INDEX IF NOT EXISTS idx_person_office_person ON person_office(person_id);
    CREATE INDEX IF NOT EXISTS idx_person_office_office ON person_office(office_id);
    CREATE INDEX IF NOT EXISTS idx_factoid_subject ON factoid(subject_id);
    CREATE INDEX IF NOT EXISTS idx_factoid_object ON factoid(object_id);
    CREATE INDEX IF NOT EXISTS idx_factoid_document ON factoid(document_id);
    CREATE INDEX IF NOT EXISTS idx_global_id_subject ON global_id(subject_type, subject_id);
    CREATE INDEX IF NOT EXISTS idx_global_id_authority ON global_id(authority_id, subject_type, subject_id);
"#;

/// SQLite-backed store
///
/// Uses a single SQLite database file holding every table of the graph.
/// Thread-safe via internal mutex on the connection; each unit of work holds
/// the connection for its whole duration.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file with a custom busy timeout.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init_schema(&conn, busy_timeout)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Initialize the database schema and connection pragmas
    fn init_schema(conn: &Connection, busy_timeout: Duration) -> StorageResult<()> {
        conn.busy_timeout(busy_timeout)?;
        // In-memory databases answer "memory" here; that is fine.
        let _journal_mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// See [`run_in`] for the commit/rollback contract.
    pub fn run<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&UnitOfWork<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.lock()?;
        run_in(&mut conn, f)
    }

    /// Run a read-only closure against the connection, outside any explicit transaction.
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StorageError>,
    {
        let conn = self.lock()?;
        f(&conn)
    }

    /// SQLite's `PRAGMA data_version`: changes whenever another connection
    /// commits to the database file.
    pub fn data_version(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        let version: i64 = conn.query_row("PRAGMA data_version", [], |row| row.get(0))?;
        Ok(u64::try_from(version).unwrap_or_default())
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn, DEFAULT_BUSY_TIMEOUT)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
