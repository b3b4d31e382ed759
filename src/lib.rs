//! Prosopa: Entity Graph Integrity Engine
//!
//! Backend for a bibliographic and prosopographic database whose tables
//! reference each other by id without any database-enforced integrity.
//! The engine supplies what the store does not:
//!
//! - **Hierarchies**: ancestor/descendant closures and root paths over the
//!   content, office and region trees, safe against cycles in the data
//! - **Dependency guard**: refuses to delete an entity that is still
//!   referenced and removes its owned rows when it is not
//! - **Merge compaction**: moves the edges of a duplicate entity onto its
//!   canonical twin and collapses rows that now repeat a natural key
//!
//! Every write runs as one [`UnitOfWork`].
//!
//! # Example
//!
//! ```
//! use prosopa::{HierarchyKind, IntegrityEngine, NewNode, OpenStore, SqliteStore};
//!
//! let engine = IntegrityEngine::new(SqliteStore::open_in_memory().unwrap());
//! let francia = engine.create(&NewNode::root(HierarchyKind::Region, "Francia")).unwrap();
//! let metz = engine.create(&NewNode::child(HierarchyKind::Region, francia, "Metz")).unwrap();
//!
//! let closure = engine.descendants(HierarchyKind::Region, &[francia]).unwrap();
//! assert!(closure[&francia].contains(&metz));
//! ```

pub mod config;
mod graph;
pub mod guard;
pub mod hierarchy;
pub mod merge;
pub mod records;
pub mod storage;

pub use config::{ConfigError, EngineConfig};
pub use graph::{EntityId, EntityType, IntegrityEngine, IntegrityError, IntegrityResult, UnknownEntityType};
pub use guard::{DeleteReport, DependencyGuard, RuleSet};
pub use hierarchy::{AncestorPath, HierarchyKind, HierarchyNode, PathStep, TreeResolver};
pub use merge::{MergeCompactor, MergeReport, RelationCatalog, RelationSpec};
pub use records::{NewDocument, NewNode, Record};
pub use storage::{OpenStore, SqliteStore, StorageError, StorageResult, UnitOfWork};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
