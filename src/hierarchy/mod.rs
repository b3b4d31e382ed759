//! Hierarchy resolution
//!
//! Content categories, offices and regions are self-referential tables
//! (`id`, `parent_id`, `name`). [`TreeResolver`] answers closure and path
//! questions over one of them without help from the store.

mod resolver;
mod types;

pub use resolver::TreeResolver;
pub use types::{AncestorPath, HierarchyKind, HierarchyNode, PathStep};
