//! UnitOfWork: the atomic multi-statement mutation primitive.
//!
//! Every write in the engine goes through [`run_in`]: the closure receives a
//! [`UnitOfWork`] bound to an `IMMEDIATE` transaction, which is committed when
//! the closure returns `Ok` and rolled back when it returns `Err`. Nothing the
//! closure did is visible to other connections unless it commits.

use super::traits::{StorageError, StorageResult};
use crate::graph::EntityId;
use rusqlite::{Connection, OptionalExtension, Params, Transaction, TransactionBehavior};
use tracing::{debug, warn};

/// An open transaction handed to a unit of work closure.
pub struct UnitOfWork<'conn> {
    tx: Transaction<'conn>,
}

impl<'conn> UnitOfWork<'conn> {
    fn begin(conn: &'conn mut Connection) -> StorageResult<Self> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        Ok(Self { tx })
    }

    /// Execute a statement, returning the number of affected rows.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> StorageResult<usize> {
        Ok(self.tx.execute(sql, params)?)
    }

    /// Execute several `;`-separated statements without parameters.
    pub fn execute_batch(&self, sql: &str) -> StorageResult<()> {
        Ok(self.tx.execute_batch(sql)?)
    }

    /// Run a `SELECT COUNT(*) ...` statement.
    pub fn count<P: Params>(&self, sql: &str, params: P) -> StorageResult<u64> {
        let n: i64 = self.tx.query_row(sql, params, |row| row.get(0))?;
        Ok(u64::try_from(n).unwrap_or_default())
    }

    /// Whether `table` has a row whose `id_column` equals `id`.
    ///
    /// `table` and `id_column` must already be validated identifiers.
    pub fn exists(&self, table: &str, id_column: &str, id: EntityId) -> StorageResult<bool> {
        let sql = format!("SELECT 1 FROM {table} WHERE {id_column} = ?1 LIMIT 1");
        let found: Option<i64> = self
            .tx
            .query_row(&sql, [id.get()], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Execute an `INSERT` and return the generated key of the new row.
    ///
    /// The key comes from the statement itself (`RETURNING id`), never from a
    /// follow-up "most recent row" query, so concurrent writers on the same
    /// table cannot hand each other the wrong id.
    pub fn insert_returning_id<P: Params>(&self, insert_sql: &str, params: P) -> StorageResult<EntityId> {
        let sql = format!("{} RETURNING id", insert_sql.trim_end().trim_end_matches(';'));
        let id: i64 = self.tx.query_row(&sql, params, |row| row.get(0))?;
        Ok(EntityId::new(id))
    }

    /// Run a query whose first column is an id.
    pub fn query_ids<P: Params>(&self, sql: &str, params: P) -> StorageResult<Vec<EntityId>> {
        let mut stmt = self.tx.prepare(sql)?;
        let ids = stmt
            .query_map(params, |row| row.get::<_, i64>(0))?
            .map(|r| r.map(EntityId::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Borrow the underlying connection for reads that need the full rusqlite API.
    pub fn connection(&self) -> &Connection {
        &self.tx
    }

    fn commit(self) -> StorageResult<()> {
        self.tx.commit()?;
        debug!("unit of work committed");
        Ok(())
    }

    fn rollback(self) {
        match self.tx.rollback() {
            Ok(()) => debug!("unit of work rolled back"),
            Err(e) => warn!(error = %e, "rollback failed; transaction is dropped"),
        }
    }
}

/// Run `f` inside a single transaction on `conn`.
///
/// Commits when `f` returns `Ok`, rolls back and returns the error otherwise.
/// A failure to commit is reported as the error of the whole unit.
pub fn run_in<T, E, F>(conn: &mut Connection, f: F) -> Result<T, E>
where
    F: FnOnce(&UnitOfWork<'_>) -> Result<T, E>,
    E: From<StorageError>,
{
    let uow = UnitOfWork::begin(conn)?;
    match f(&uow) {
        Ok(value) => {
            uow.commit()?;
            Ok(value)
        }
        Err(err) => {
            uow.rollback();
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    fn create_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
             CREATE TABLE person_office (id INTEGER PRIMARY KEY, person_id INTEGER, office_id INTEGER);",
        )
        .unwrap();
        conn
    }

    fn person_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM person", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_commit_on_ok() {
        let mut conn = create_test_connection();

        let id = run_in(&mut conn, |uow| {
            uow.insert_returning_id("INSERT INTO person (name) VALUES (?1)", params!["Hrabanus"])
        })
        .unwrap();

        assert_eq!(id, EntityId::new(1));
        assert_eq!(person_count(&conn), 1);
    }

    #[test]
    fn test_rollback_on_err() {
        let mut conn = create_test_connection();

        let result: StorageResult<()> = run_in(&mut conn, |uow| {
            uow.execute("INSERT INTO person (name) VALUES (?1)", params!["Alcuin"])?;
            // Second statement fails: the first insert must not survive.
            uow.execute("INSERT INTO no_such_table (x) VALUES (1)", [])?;
            Ok(())
        });

        assert!(matches!(result, Err(StorageError::Database(_))));
        assert_eq!(person_count(&conn), 0);
    }

    #[test]
    fn test_generated_id_feeds_dependent_rows() {
        let mut conn = create_test_connection();

        run_in(&mut conn, |uow| -> StorageResult<()> {
            let a = uow.insert_returning_id("INSERT INTO person (name) VALUES ('a')", [])?;
            let b = uow.insert_returning_id("INSERT INTO person (name) VALUES ('b');", [])?;
            assert_ne!(a, b);
            uow.execute(
                "INSERT INTO person_office (person_id, office_id) VALUES (?1, 7)",
                [b.get()],
            )?;
            Ok(())
        })
        .unwrap();

        let holder: i64 = conn
            .query_row("SELECT person_id FROM person_office", [], |row| row.get(0))
            .unwrap();
        assert_eq!(holder, 2);
    }

    #[test]
    fn test_count_exists_and_query_ids() {
        let mut conn = create_test_connection();

        run_in(&mut conn, |uow| -> StorageResult<()> {
            uow.execute("INSERT INTO person (name) VALUES ('a'), ('b'), ('c')", [])?;
            assert_eq!(uow.count("SELECT COUNT(*) FROM person WHERE id > ?1", [1])?, 2);
            assert!(uow.exists("person", "id", EntityId::new(3))?);
            assert!(!uow.exists("person", "id", EntityId::new(4))?);
            let ids = uow.query_ids("SELECT id FROM person ORDER BY id DESC", [])?;
            assert_eq!(ids, vec![EntityId::new(3), EntityId::new(2), EntityId::new(1)]);
            Ok(())
        })
        .unwrap();
    }
}
