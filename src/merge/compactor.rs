//! Duplicate-entity merge and edge compaction

use super::relation::{RelationCatalog, RelationSpec};
use crate::graph::{EntityId, EntityType, IntegrityError, IntegrityResult};
use crate::storage::{bind_filter, SqliteStore, StorageResult, UnitOfWork};
use rusqlite::ToSql;
use serde::Serialize;
use tracing::{debug, info};

/// Row counts of one relation-kind merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub relation: String,
    pub primary: EntityId,
    pub secondary: EntityId,
    /// Rows moved from `secondary` to `primary`
    pub reassigned: usize,
    /// Duplicate rows removed by compaction
    pub removed: usize,
}

impl MergeReport {
    fn unchanged(spec: &RelationSpec, primary: EntityId, secondary: EntityId) -> Self {
        Self {
            relation: spec.name.clone(),
            primary,
            secondary,
            reassigned: 0,
            removed: 0,
        }
    }

    pub fn affected(&self) -> usize {
        self.reassigned + self.removed
    }
}

/// Collapses the edges of a duplicate entity onto its canonical twin.
///
/// No existence or type check is made on either id. Merging an id into
/// itself is a no-op.
pub struct MergeCompactor<'a> {
    store: &'a SqliteStore,
    catalog: &'a RelationCatalog,
}

impl<'a> MergeCompactor<'a> {
    pub fn new(store: &'a SqliteStore, catalog: &'a RelationCatalog) -> Self {
        Self { store, catalog }
    }

    /// Reassign and compact one relation kind in a single unit of work.
    pub fn merge(&self, relation: &str, primary: EntityId, secondary: EntityId) -> IntegrityResult<MergeReport> {
        let spec = self
            .catalog
            .get(relation)
            .ok_or_else(|| IntegrityError::UnknownRelation(relation.to_string()))?;
        self.merge_spec(spec, primary, secondary)
    }

    /// Merge every relation kind declared for `entity`, one unit of work each.
    ///
    /// Stops at the first failing kind; kinds merged before it stay committed.
    pub fn merge_entity(
        &self,
        entity: EntityType,
        primary: EntityId,
        secondary: EntityId,
    ) -> IntegrityResult<Vec<MergeReport>> {
        self.catalog
            .for_entity(entity)
            .map(|spec| self.merge_spec(spec, primary, secondary))
            .collect()
    }

    fn merge_spec(&self, spec: &RelationSpec, primary: EntityId, secondary: EntityId) -> IntegrityResult<MergeReport> {
        if primary == secondary {
            debug!(relation = %spec.name, %primary, "merge into self skipped");
            return Ok(MergeReport::unchanged(spec, primary, secondary));
        }

        let report = self.store.run(|uow| -> IntegrityResult<MergeReport> {
            let reassigned = reassign(uow, spec, primary, secondary)?;
            debug!(relation = %spec.name, %primary, %secondary, reassigned, "edges reassigned");
            let removed = compact(uow, spec)?;
            debug!(relation = %spec.name, removed, "duplicates compacted");
            Ok(MergeReport {
                relation: spec.name.clone(),
                primary,
                secondary,
                reassigned,
                removed,
            })
        })?;

        if report.affected() > 0 {
            info!(
                relation = %report.relation,
                %primary,
                %secondary,
                reassigned = report.reassigned,
                removed = report.removed,
                "relation merged"
            );
        }
        Ok(report)
    }
}

fn reassign(uow: &UnitOfWork<'_>, spec: &RelationSpec, primary: EntityId, secondary: EntityId) -> StorageResult<usize> {
    let (sql, filter_value) = spec.reassign_sql();
    let (p, s) = (primary.get(), secondary.get());
    let params = bind_filter(vec![&p as &dyn ToSql, &s], filter_value);
    uow.execute(&sql, params.as_slice())
}

fn compact(uow: &UnitOfWork<'_>, spec: &RelationSpec) -> StorageResult<usize> {
    let (sql, filter_value) = spec.compact_sql();
    let params = bind_filter(Vec::new(), filter_value);
    uow.execute(&sql, params.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::OpenStore;

    fn create_test_store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .run(|uow| {
                uow.execute_batch(
                    "INSERT INTO document_person (id, document_id, person_id, role_id) VALUES
                         (1, 5, 1, 2), (2, 5, 2, 2), (3, 6, 2, 2), (4, 7, 3, 1);
                     INSERT INTO global_id (id, authority_id, subject_type, subject_id, identifiers) VALUES
                         (1, 1, 'person', 1, '[\"p1\"]'),
                         (2, 1, 'person', 2, '[\"p2\"]'),
                         (3, 1, 'document', 2, '[\"d2\"]');",
                )
            })
            .unwrap();
        store
    }

    fn authorships(store: &SqliteStore) -> Vec<(i64, i64, i64, i64)> {
        store
            .read(|conn| -> StorageResult<_> {
                let mut stmt =
                    conn.prepare("SELECT id, document_id, person_id, role_id FROM document_person ORDER BY id")?;
                let rows = stmt
                    .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .unwrap()
    }

    #[test]
    fn test_merge_collapses_duplicate_authorship() {
        let store = create_test_store();
        let catalog = RelationCatalog::builtin();
        let compactor = MergeCompactor::new(&store, &catalog);

        let report = compactor.merge("authorship", EntityId::new(1), EntityId::new(2)).unwrap();

        assert_eq!(report.reassigned, 2);
        assert_eq!(report.removed, 1);
        assert_eq!(authorships(&store), vec![(1, 5, 1, 2), (3, 6, 1, 2), (4, 7, 3, 1)]);
    }

    #[test]
    fn test_merge_twice_is_a_no_op() {
        let store = create_test_store();
        let catalog = RelationCatalog::builtin();
        let compactor = MergeCompactor::new(&store, &catalog);

        compactor.merge("authorship", EntityId::new(1), EntityId::new(2)).unwrap();
        let second = compactor.merge("authorship", EntityId::new(1), EntityId::new(2)).unwrap();

        assert_eq!(second.affected(), 0);
    }

    #[test]
    fn test_filtered_relation_leaves_other_subject_types() {
        let store = create_test_store();
        let catalog = RelationCatalog::builtin();
        let compactor = MergeCompactor::new(&store, &catalog);

        let report = compactor
            .merge("person_identifier", EntityId::new(1), EntityId::new(2))
            .unwrap();
        assert_eq!((report.reassigned, report.removed), (1, 1));

        let rows: Vec<(String, i64)> = store
            .read(|conn| -> StorageResult<_> {
                let mut stmt = conn.prepare("SELECT subject_type, subject_id FROM global_id ORDER BY id")?;
                let rows = stmt
                    .query_map([], |r| Ok((r.get(0)?, r.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .unwrap();
        assert_eq!(rows, vec![("person".to_string(), 1), ("document".to_string(), 2)]);
    }

    #[test]
    fn test_unknown_relation() {
        let store = create_test_store();
        let catalog = RelationCatalog::builtin();
        let compactor = MergeCompactor::new(&store, &catalog);

        let err = compactor.merge("friendship", EntityId::new(1), EntityId::new(2)).unwrap_err();
        assert!(matches!(err, IntegrityError::UnknownRelation(name) if name == "friendship"));
    }

    #[test]
    fn test_merge_into_self_changes_nothing() {
        let store = create_test_store();
        store
            .run(|uow| uow.execute("INSERT INTO document_person (document_id, person_id, role_id) VALUES (7, 3, 1)", []))
            .unwrap();
        let catalog = RelationCatalog::builtin();
        let compactor = MergeCompactor::new(&store, &catalog);

        let report = compactor.merge("authorship", EntityId::new(3), EntityId::new(3)).unwrap();

        assert_eq!(report.affected(), 0);
        assert_eq!(authorships(&store).len(), 5);
    }

    #[test]
    fn test_merge_entity_reports_every_person_relation() {
        let store = create_test_store();
        let catalog = RelationCatalog::builtin();
        let compactor = MergeCompactor::new(&store, &catalog);

        let reports = compactor
            .merge_entity(EntityType::Person, EntityId::new(1), EntityId::new(2))
            .unwrap();

        let names: Vec<_> = reports.iter().map(|r| r.relation.as_str()).collect();
        assert_eq!(names, catalog.for_entity(EntityType::Person).map(|r| r.name.as_str()).collect::<Vec<_>>());
        let total: usize = reports.iter().map(MergeReport::affected).sum();
        assert_eq!(total, 5);
    }
}
