//! Closure and path resolution over a hierarchy arena

use super::types::{AncestorPath, HierarchyKind, HierarchyNode, PathStep};
use crate::graph::EntityId;
use crate::storage::StorageResult;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use tracing::warn;

struct Entry {
    label: String,
    /// Sorted, deduplicated parent links. Normally zero or one.
    parents: Vec<EntityId>,
}

/// Resolves ancestor/descendant questions over one hierarchy.
///
/// The hierarchy is held as an arena keyed by id with a derived children
/// index, so every traversal is iterative and carries a visited set. Cycles in
/// the stored data therefore end a traversal instead of looping.
///
/// A node may carry more than one parent link when the same id appears in
/// several rows. Ancestor resolution then considers every chain and keeps the
/// longest one.
pub struct TreeResolver {
    kind: HierarchyKind,
    nodes: HashMap<EntityId, Entry>,
    children: HashMap<EntityId, Vec<EntityId>>,
}

impl TreeResolver {
    /// Build the arena from hierarchy rows
    pub fn from_nodes(kind: HierarchyKind, rows: impl IntoIterator<Item = HierarchyNode>) -> Self {
        let mut nodes: HashMap<EntityId, Entry> = HashMap::new();
        for row in rows {
            let entry = nodes.entry(row.id).or_insert_with(|| Entry {
                label: row.label,
                parents: Vec::new(),
            });
            if let Some(parent) = row.parent_id {
                entry.parents.push(parent);
            }
        }

        let mut children: HashMap<EntityId, Vec<EntityId>> = HashMap::new();
        for (id, entry) in &mut nodes {
            entry.parents.sort_unstable();
            entry.parents.dedup();
            for parent in &entry.parents {
                children.entry(*parent).or_default().push(*id);
            }
        }
        for list in children.values_mut() {
            list.sort_unstable();
        }

        Self { kind, nodes, children }
    }

    /// Load every row of the hierarchy's table
    pub fn load(conn: &Connection, kind: HierarchyKind) -> StorageResult<Self> {
        let sql = format!("SELECT id, parent_id, name FROM {} ORDER BY id", kind.table());
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(HierarchyNode {
                    id: EntityId::new(row.get(0)?),
                    parent_id: row.get::<_, Option<i64>>(1)?.map(EntityId::new),
                    label: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_nodes(kind, rows))
    }

    pub fn kind(&self) -> HierarchyKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Label of a node
    pub fn label(&self, id: EntityId) -> Option<&str> {
        self.nodes.get(&id).map(|e| e.label.as_str())
    }

    /// Direct children, ascending by id
    pub fn children(&self, id: EntityId) -> &[EntityId] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Nodes without a parent link, ascending by id
    pub fn roots(&self) -> Vec<EntityId> {
        let mut roots: Vec<_> = self
            .nodes
            .iter()
            .filter(|(_, e)| e.parents.is_empty())
            .map(|(id, _)| *id)
            .collect();
        roots.sort_unstable();
        roots
    }

    /// Every node reachable below `id`, excluding `id` itself.
    ///
    /// Returns `None` when `id` is not part of the hierarchy.
    pub fn descendants(&self, id: EntityId) -> Option<BTreeSet<EntityId>> {
        if !self.contains(id) {
            return None;
        }

        let mut visited: HashSet<EntityId> = HashSet::from([id]);
        let mut queue: VecDeque<EntityId> = VecDeque::from([id]);
        let mut found = BTreeSet::new();

        while let Some(current) = queue.pop_front() {
            for &child in self.children(current) {
                if visited.insert(child) {
                    found.insert(child);
                    queue.push_back(child);
                } else if child == id {
                    warn!(hierarchy = %self.kind, node = %id, via = %current, "cycle reaches traversal origin");
                }
            }
        }

        Some(found)
    }

    /// Batch form of [`descendants`](Self::descendants); unknown ids are omitted.
    pub fn descendants_of(&self, ids: &[EntityId]) -> BTreeMap<EntityId, BTreeSet<EntityId>> {
        ids.iter()
            .filter_map(|&id| self.descendants(id).map(|set| (id, set)))
            .collect()
    }

    /// Chain from the deepest root ancestor down to `id`.
    ///
    /// All chains obtained by following parent links are enumerated and the
    /// longest one is kept. Between chains of equal length the first found
    /// wins, with parents explored in ascending id order. A parent link to a
    /// missing node, or back into the chain itself, ends that chain.
    pub fn ancestor_path(&self, id: EntityId) -> Option<AncestorPath> {
        if !self.contains(id) {
            return None;
        }

        // Chains are built leaf-first and reversed at the end.
        let mut best: Vec<EntityId> = Vec::new();
        let mut stack: Vec<Vec<EntityId>> = vec![vec![id]];

        while let Some(chain) = stack.pop() {
            let Some(&head) = chain.last() else { continue };
            let parents = self.nodes.get(&head).map(|e| e.parents.as_slice()).unwrap_or(&[]);

            let mut extended = false;
            // Reverse push so the lowest parent id is explored first.
            for &parent in parents.iter().rev() {
                if chain.contains(&parent) {
                    warn!(hierarchy = %self.kind, node = %head, parent = %parent, "cycle in parent links");
                    continue;
                }
                if !self.contains(parent) {
                    continue;
                }
                let mut next = chain.clone();
                next.push(parent);
                stack.push(next);
                extended = true;
            }

            if !extended && chain.len() > best.len() {
                best = chain;
            }
        }

        Some(
            best.into_iter()
                .rev()
                .map(|step| PathStep {
                    id: step,
                    label: self.label(step).unwrap_or_default().to_string(),
                })
                .collect(),
        )
    }

    /// Batch form of [`ancestor_path`](Self::ancestor_path); unknown ids are omitted.
    pub fn ancestor_paths(&self, ids: &[EntityId]) -> BTreeMap<EntityId, AncestorPath> {
        ids.iter()
            .filter_map(|&id| self.ancestor_path(id).map(|path| (id, path)))
            .collect()
    }
}
