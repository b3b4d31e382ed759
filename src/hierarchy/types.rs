//! Hierarchy kinds, nodes and path results

use crate::graph::EntityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three self-referential hierarchies of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyKind {
    /// Content and genre categories
    Content,
    /// Offices and occupations
    Office,
    /// Geographic regions
    Region,
}

impl HierarchyKind {
    pub const ALL: [HierarchyKind; 3] = [Self::Content, Self::Office, Self::Region];

    /// Table holding the hierarchy's `(id, parent_id, name)` rows
    pub const fn table(self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Office => "office",
            Self::Region => "region",
        }
    }
}

impl fmt::Display for HierarchyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

impl FromStr for HierarchyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.table() == s)
            .ok_or_else(|| format!("unknown hierarchy: {s}"))
    }
}

/// One row of a hierarchy table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: EntityId,
    /// `None` marks a root
    pub parent_id: Option<EntityId>,
    pub label: String,
}

impl HierarchyNode {
    pub fn root(id: i64, label: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(id),
            parent_id: None,
            label: label.into(),
        }
    }

    pub fn child(id: i64, parent_id: i64, label: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(id),
            parent_id: Some(EntityId::new(parent_id)),
            label: label.into(),
        }
    }
}

/// One `(id, label)` element of an ancestor path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathStep {
    pub id: EntityId,
    pub label: String,
}

/// Chain from the deepest root ancestor down to the queried node (inclusive)
pub type AncestorPath = Vec<PathStep>;
