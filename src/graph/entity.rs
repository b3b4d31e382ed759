//! Entity identity and type tags

use crate::hierarchy::HierarchyKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric identifier of a row in the graph (entity, hierarchy node or edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw database id
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// Type tag of an entity taking part in dependency tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Document,
    Person,
    Place,
    Bibliography,
    Content,
    Office,
    Region,
    Role,
    Authority,
}

impl EntityType {
    pub const ALL: [EntityType; 9] = [
        Self::Document,
        Self::Person,
        Self::Place,
        Self::Bibliography,
        Self::Content,
        Self::Office,
        Self::Region,
        Self::Role,
        Self::Authority,
    ];

    /// Stable lowercase name, as used in configuration and in `global_id.subject_type`
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Person => "person",
            Self::Place => "place",
            Self::Bibliography => "bibliography",
            Self::Content => "content",
            Self::Office => "office",
            Self::Region => "region",
            Self::Role => "role",
            Self::Authority => "authority",
        }
    }

    /// Table holding the entity's root row
    pub const fn table(self) -> &'static str {
        match self {
            Self::Bibliography => "bib",
            other => other.as_str(),
        }
    }

    /// The hierarchy this entity type forms, if it is a hierarchy node
    pub const fn hierarchy(self) -> Option<HierarchyKind> {
        match self {
            Self::Content => Some(HierarchyKind::Content),
            Self::Office => Some(HierarchyKind::Office),
            Self::Region => Some(HierarchyKind::Region),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown entity type name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown entity type: {0}")]
pub struct UnknownEntityType(pub String);

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s || (s == "bib" && *t == Self::Bibliography))
            .ok_or_else(|| UnknownEntityType(s.to_string()))
    }
}
