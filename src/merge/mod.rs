//! Merging duplicate entities
//!
//! A merge rewrites one relation table at a time: every edge pointing at the
//! secondary id is moved to the primary id, then rows that now repeat the
//! relation's natural key are collapsed onto the lowest row id.

mod compactor;
mod relation;

pub use compactor::{MergeCompactor, MergeReport};
pub use relation::{RelationCatalog, RelationSpec};
