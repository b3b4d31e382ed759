//! Dependency-guarded deletion

use super::rules::{DependencyCheck, EntityRule, RuleSet};
use crate::graph::{EntityId, EntityType, IntegrityError, IntegrityResult};
use crate::storage::{bind_filter, SqliteStore, StorageResult, UnitOfWork};
use rusqlite::{Connection, ToSql};
use serde::Serialize;
use tracing::{debug, info};

/// Rows removed by one cascade step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeCount {
    pub table: String,
    pub rows: usize,
}

/// Outcome of a committed deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub entity: EntityType,
    pub id: EntityId,
    /// Owned child rows removed, in cascade order
    pub cascaded: Vec<CascadeCount>,
}

impl DeleteReport {
    pub fn cascaded_rows(&self) -> usize {
        self.cascaded.iter().map(|c| c.rows).sum()
    }
}

/// Refuses to delete entities that are still referenced.
///
/// The store declares no `ON DELETE RESTRICT` or cascade rules, so the guard
/// evaluates the entity type's checks in order, stops at the first one that
/// finds a reference, and otherwise removes owned rows and the root row in a
/// single unit of work.
pub struct DependencyGuard<'a> {
    store: &'a SqliteStore,
    rules: &'a RuleSet,
}

impl<'a> DependencyGuard<'a> {
    pub fn new(store: &'a SqliteStore, rules: &'a RuleSet) -> Self {
        Self { store, rules }
    }

    fn rule(&self, entity: EntityType) -> IntegrityResult<&'a EntityRule> {
        self.rules.get(entity).ok_or(IntegrityError::Unguarded(entity))
    }

    /// Evaluate the checks for `entity` without deleting anything.
    ///
    /// Runs in its own unit of work so existence and the checks see one
    /// snapshot. Returns `Ok(())` when deletion would be allowed.
    pub fn check(&self, entity: EntityType, id: EntityId) -> IntegrityResult<()> {
        let rule = self.rule(entity)?;
        self.store.run(|uow| {
            if !uow.exists(entity.table(), "id", id)? {
                return Err(IntegrityError::NotFound { entity, id });
            }
            ensure_unreferenced(uow.connection(), rule, entity, id)
        })
    }

    /// Delete `entity` `id` if nothing references it.
    ///
    /// Fails with `NotFound` when the root row is absent and with `Dependency`
    /// naming the first blocking check otherwise; neither case mutates
    /// anything. Any error during the cascade rolls the whole deletion back.
    pub fn delete(&self, entity: EntityType, id: EntityId) -> IntegrityResult<DeleteReport> {
        let rule = self.rule(entity)?;

        let report = self.store.run(|uow| {
            if !uow.exists(entity.table(), "id", id)? {
                return Err(IntegrityError::NotFound { entity, id });
            }
            ensure_unreferenced(uow.connection(), rule, entity, id)?;

            let mut cascaded = Vec::with_capacity(rule.cascade.len());
            for step in &rule.cascade {
                let (sql, filter_value) = step.delete_sql();
                let rows = execute_for(uow, &sql, id, filter_value)?;
                debug!(%entity, %id, table = %step.table, rows, "cascade step");
                cascaded.push(CascadeCount {
                    table: step.table.clone(),
                    rows,
                });
            }

            let sql = format!("DELETE FROM {} WHERE id = ?1", entity.table());
            uow.execute(&sql, [id.get()])?;

            Ok(DeleteReport { entity, id, cascaded })
        })?;

        info!(%entity, %id, cascaded = report.cascaded_rows(), "entity deleted");
        Ok(report)
    }
}

/// Fail fast on the first check with a non-zero count.
fn ensure_unreferenced(conn: &Connection, rule: &EntityRule, entity: EntityType, id: EntityId) -> IntegrityResult<()> {
    match first_blocking(conn, rule, id)? {
        Some(check) => Err(IntegrityError::Dependency {
            entity,
            id,
            reason: check.message.clone(),
        }),
        None => Ok(()),
    }
}

fn first_blocking<'r>(conn: &Connection, rule: &'r EntityRule, id: EntityId) -> StorageResult<Option<&'r DependencyCheck>> {
    let raw_id = id.get();
    for check in &rule.checks {
        let (sql, filter_value) = check.count_sql();
        let params = bind_filter(vec![&raw_id as &dyn ToSql], filter_value);
        let count: i64 = conn.query_row(&sql, params.as_slice(), |row| row.get(0))?;
        debug!(%id, table = %check.table, column = %check.column, count, "dependency check");
        if count > 0 {
            return Ok(Some(check));
        }
    }
    Ok(None)
}

fn execute_for(uow: &UnitOfWork<'_>, sql: &str, id: EntityId, filter_value: Option<&String>) -> StorageResult<usize> {
    let raw_id = id.get();
    let params = bind_filter(vec![&raw_id as &dyn ToSql], filter_value);
    uow.execute(sql, params.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::DependencyCheck;
    use crate::storage::OpenStore;

    fn create_test_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .run(|uow| {
                uow.execute_batch(
                    "INSERT INTO document (id, document_type) VALUES (1, 'letter'), (2, 'letter');
                     INSERT INTO document_title (document_id, title) VALUES (1, 'Epistola I'), (1, 'Letter I');
                     INSERT INTO document_date (document_id, date) VALUES (1, '0796-01-01');
                     INSERT INTO global_id (authority_id, subject_type, subject_id, identifiers)
                         VALUES (1, 'document', 1, '[\"MGH Epp. 4\"]'), (1, 'person', 1, '[\"x\"]');
                     INSERT INTO document_reference (source_id, target_id, reference_type) VALUES (2, 1, 'reply');",
                )
            })
            .unwrap();
        store
    }

    fn count(store: &SqliteStore, sql: &str) -> i64 {
        store
            .read(|conn| -> StorageResult<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) })
            .unwrap()
    }

    #[test]
    fn test_delete_blocked_by_first_check() {
        let store = create_test_store();
        let rules = RuleSet::builtin();
        let guard = DependencyGuard::new(&store, &rules);

        // Document 2 is the source of a reference: the first document check.
        let err = guard.delete(EntityType::Document, EntityId::new(2)).unwrap_err();
        match err {
            IntegrityError::Dependency { entity, id, reason } => {
                assert_eq!(entity, EntityType::Document);
                assert_eq!(id, EntityId::new(2));
                assert_eq!(reason, "document is the source of a reference to another document");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(count(&store, "SELECT COUNT(*) FROM document"), 2);
    }

    #[test]
    fn test_delete_reports_only_first_blocking_check() {
        let store = create_test_store();
        store
            .run(|uow| uow.execute("INSERT INTO document_person (document_id, person_id, role_id) VALUES (1, 5, 1)", []))
            .unwrap();
        let rules = RuleSet::builtin();
        let guard = DependencyGuard::new(&store, &rules);

        // Document 1 is both a reference target (check 2) and has persons (check 3).
        let err = guard.delete(EntityType::Document, EntityId::new(1)).unwrap_err();
        assert!(err.to_string().contains("referenced by another document"), "{err}");
    }

    #[test]
    fn test_delete_cascades_owned_rows() {
        let store = create_test_store();
        store
            .run(|uow| uow.execute("DELETE FROM document_reference", []))
            .unwrap();
        let rules = RuleSet::builtin();
        let guard = DependencyGuard::new(&store, &rules);

        let report = guard.delete(EntityType::Document, EntityId::new(1)).unwrap();

        assert_eq!(report.cascaded[0], CascadeCount { table: "document_title".into(), rows: 2 });
        assert_eq!(report.cascaded_rows(), 4);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM document WHERE id = 1"), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM document_title"), 0);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM document_date"), 0);
        // The person's identifier shares subject_id 1 but not the subject type.
        assert_eq!(count(&store, "SELECT COUNT(*) FROM global_id"), 1);
    }

    #[test]
    fn test_delete_missing_entity() {
        let store = create_test_store();
        let rules = RuleSet::builtin();
        let guard = DependencyGuard::new(&store, &rules);

        let err = guard.delete(EntityType::Person, EntityId::new(77)).unwrap_err();
        assert!(matches!(err, IntegrityError::NotFound { .. }));
        let err = guard.check(EntityType::Document, EntityId::new(77)).unwrap_err();
        assert!(matches!(err, IntegrityError::NotFound { entity: EntityType::Document, .. }));
    }

    #[test]
    fn test_failing_cascade_rolls_back() {
        let store = create_test_store();
        store
            .run(|uow| uow.execute("DELETE FROM document_reference", []))
            .unwrap();
        let mut rules = RuleSet::builtin();
        rules
            .add_cascade(EntityType::Document, crate::guard::CascadeStep::new("missing_table", "document_id"))
            .unwrap();
        let guard = DependencyGuard::new(&store, &rules);

        let err = guard.delete(EntityType::Document, EntityId::new(1)).unwrap_err();
        assert!(matches!(err, IntegrityError::Storage(_)));
        assert_eq!(count(&store, "SELECT COUNT(*) FROM document_title"), 2);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM document WHERE id = 1"), 1);
    }

    #[test]
    fn test_check_does_not_mutate() {
        let store = create_test_store();
        let mut rules = RuleSet::default();
        rules
            .add_check(EntityType::Document, DependencyCheck::new("document_title", "document_id", "has titles"))
            .unwrap();
        let guard = DependencyGuard::new(&store, &rules);

        assert!(guard.check(EntityType::Document, EntityId::new(2)).is_ok());
        assert!(matches!(
            guard.check(EntityType::Document, EntityId::new(1)),
            Err(IntegrityError::Dependency { .. })
        ));
        assert!(matches!(
            guard.check(EntityType::Person, EntityId::new(1)),
            Err(IntegrityError::Unguarded(EntityType::Person))
        ));
    }
}
