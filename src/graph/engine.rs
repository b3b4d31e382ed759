//! IntegrityEngine: the main entry point for reads and guarded writes

use super::entity::{EntityId, EntityType};
use crate::guard::{DeleteReport, DependencyGuard, RuleSet};
use crate::hierarchy::{AncestorPath, HierarchyKind, TreeResolver};
use crate::merge::{MergeCompactor, MergeReport, RelationCatalog};
use crate::records::{self, Record};
use crate::storage::{SqliteStore, StorageError, UnitOfWork};
use dashmap::DashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur in engine operations
#[derive(Debug, Error)]
pub enum IntegrityError {
    #[error("Cannot delete {entity} {id}: {reason}")]
    Dependency {
        entity: EntityType,
        id: EntityId,
        reason: String,
    },

    #[error("{entity} {id} not found")]
    NotFound { entity: EntityType, id: EntityId },

    #[error("No dependency rules declared for {0}")]
    Unguarded(EntityType),

    #[error("Unknown relation kind: {0}")]
    UnknownRelation(String),

    #[error("Identifier position {position} is not allowed for authority {authority}")]
    InvalidVolume { authority: EntityId, position: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<rusqlite::Error> for IntegrityError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(e))
    }
}

impl From<serde_json::Error> for IntegrityError {
    fn from(e: serde_json::Error) -> Self {
        Self::Storage(StorageError::Serialization(e))
    }
}

/// Result type for engine operations
pub type IntegrityResult<T> = Result<T, IntegrityError>;

struct CachedTree {
    data_version: u64,
    resolver: Arc<TreeResolver>,
}

/// The integrity engine
///
/// Owns the store together with the dependency rules and merge relations,
/// and caches each loaded hierarchy until the engine itself writes to it or
/// another connection commits to the database.
pub struct IntegrityEngine {
    store: SqliteStore,
    rules: RuleSet,
    relations: RelationCatalog,
    trees: DashMap<HierarchyKind, CachedTree>,
}

impl IntegrityEngine {
    /// Create an engine with the built-in rules and relations
    pub fn new(store: SqliteStore) -> Self {
        Self::with_rules(store, RuleSet::builtin(), RelationCatalog::builtin())
    }

    pub fn with_rules(store: SqliteStore, rules: RuleSet, relations: RelationCatalog) -> Self {
        Self {
            store,
            rules,
            relations,
            trees: DashMap::new(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn relations(&self) -> &RelationCatalog {
        &self.relations
    }

    /// The resolver for `kind`, reloaded when its cached copy is stale
    pub fn tree(&self, kind: HierarchyKind) -> IntegrityResult<Arc<TreeResolver>> {
        let version = self.store.data_version()?;
        if let Some(cached) = self.trees.get(&kind) {
            if cached.data_version == version {
                return Ok(Arc::clone(&cached.resolver));
            }
        }

        let resolver = Arc::new(self.store.read(|conn| TreeResolver::load(conn, kind))?);
        debug!(%kind, nodes = resolver.len(), data_version = version, "hierarchy loaded");
        self.trees.insert(
            kind,
            CachedTree {
                data_version: version,
                resolver: Arc::clone(&resolver),
            },
        );
        Ok(resolver)
    }

    /// Descendant closures keyed by id; ids missing from the hierarchy are omitted
    pub fn descendants(
        &self,
        kind: HierarchyKind,
        ids: &[EntityId],
    ) -> IntegrityResult<BTreeMap<EntityId, BTreeSet<EntityId>>> {
        Ok(self.tree(kind)?.descendants_of(ids))
    }

    /// Root-to-node paths keyed by id; ids missing from the hierarchy are omitted
    pub fn ancestor_paths(&self, kind: HierarchyKind, ids: &[EntityId]) -> IntegrityResult<BTreeMap<EntityId, AncestorPath>> {
        Ok(self.tree(kind)?.ancestor_paths(ids))
    }

    /// Whether `entity` `id` could be deleted right now
    pub fn check(&self, entity: EntityType, id: EntityId) -> IntegrityResult<()> {
        DependencyGuard::new(&self.store, &self.rules).check(entity, id)
    }

    /// Delete `entity` `id` unless it is still referenced
    pub fn delete(&self, entity: EntityType, id: EntityId) -> IntegrityResult<DeleteReport> {
        let report = DependencyGuard::new(&self.store, &self.rules).delete(entity, id)?;
        if let Some(kind) = entity.hierarchy() {
            self.invalidate(kind);
        }
        // Configured cascade steps may reach into hierarchy tables.
        for step in self.rules.get(entity).map(|rule| rule.cascade.as_slice()).unwrap_or_default() {
            self.invalidate_table(&step.table);
        }
        Ok(report)
    }

    /// Merge one relation kind from `secondary` onto `primary`
    pub fn merge(&self, relation: &str, primary: EntityId, secondary: EntityId) -> IntegrityResult<MergeReport> {
        let report = MergeCompactor::new(&self.store, &self.relations).merge(relation, primary, secondary);
        if let Some(spec) = self.relations.get(relation) {
            self.invalidate_table(&spec.table);
        }
        report
    }

    /// Merge every relation kind declared for `entity`
    pub fn merge_entity(
        &self,
        entity: EntityType,
        primary: EntityId,
        secondary: EntityId,
    ) -> IntegrityResult<Vec<MergeReport>> {
        let reports = MergeCompactor::new(&self.store, &self.relations).merge_entity(entity, primary, secondary);
        for spec in self.relations.for_entity(entity) {
            self.invalidate_table(&spec.table);
        }
        reports
    }

    /// Insert a record and its owned rows in one unit of work
    pub fn create<R: Record + ?Sized>(&self, record: &R) -> IntegrityResult<EntityId> {
        let id = self.store.run(|uow| record.insert(uow))?;
        if let Some(kind) = record.hierarchy() {
            self.invalidate(kind);
        }
        debug!(%id, "record created");
        Ok(id)
    }

    /// Set the identifier at `position` of `subject`'s entry with `authority`.
    ///
    /// Returns the full identifier list after the change.
    pub fn assign_identifier(
        &self,
        authority: EntityId,
        subject_type: EntityType,
        subject: EntityId,
        position: usize,
        value: &str,
    ) -> IntegrityResult<Vec<String>> {
        self.store
            .run(|uow| records::assign_identifier(uow, authority, subject_type, subject, position, value))
    }

    /// Run an ad-hoc unit of work against the store.
    ///
    /// Every cached hierarchy is dropped afterwards, since the closure may
    /// have touched any table.
    pub fn run<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&UnitOfWork<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let result = self.store.run(f);
        self.trees.clear();
        result
    }

    /// Run a read-only closure against the store's connection
    pub fn read<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&rusqlite::Connection) -> Result<T, E>,
        E: From<StorageError>,
    {
        self.store.read(f)
    }

    fn invalidate(&self, kind: HierarchyKind) {
        if self.trees.remove(&kind).is_some() {
            debug!(%kind, "hierarchy cache invalidated");
        }
    }

    fn invalidate_table(&self, table: &str) {
        for kind in HierarchyKind::ALL {
            if kind.table() == table {
                self.invalidate(kind);
            }
        }
    }
}
