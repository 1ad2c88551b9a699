use std::collections::HashSet;
use std::fmt::Debug;

use indexmap::IndexMap;

use super::color::root_color;
use super::ids::{IdSource, claim_id};
use super::index::ForestIndex;
use super::snapshot::NodeRecord;

/// Error type for forest and content operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("cannot move {0} under itself or one of its descendants")]
    InvalidMove(String),
    #[error("id already in use: {0}")]
    DuplicateId(String),
    #[error("text must not be empty")]
    EmptyText,
}

/// Leaf payload carried by every node of a forest (questions and tasks for
/// threads, items for pantry categories).
pub trait NodeContent: Default + Clone + Debug {
    /// ID prefix for nodes of this forest
    const NODE_PREFIX: &'static str;

    /// IDs of every leaf record in this payload
    fn leaf_ids(&self) -> Vec<&str>;

    /// Repair a freshly loaded payload: give leaves usable unique IDs and
    /// bring field values into range.
    fn normalize(&mut self, ids: &mut dyn IdSource, taken: &mut HashSet<String>);
}

/// A node in an enableable forest. Children are held by ID; the node never
/// points back at its parent (see [`ForestIndex`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<C> {
    id: String,
    name: String,
    enabled: bool,
    color: Option<String>,
    children: Vec<String>,
    pub content: C,
}

impl<C: NodeContent> Node<C> {
    /// A detached, enabled node with empty content
    pub fn new(id: String, name: String) -> Self {
        Node {
            id,
            name,
            enabled: true,
            color: None,
            children: Vec::new(),
            content: C::default(),
        }
    }
}

impl<C> Node<C> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The node's own flag; see [`Forest::is_effectively_enabled`] for the closure
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Display color; only ever assigned to top-level nodes
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }
}

/// Arena-backed forest: a flat map from ID to node plus the ordered list of
/// top-level IDs, with a parent/root index rebuilt after every structural change.
#[derive(Debug, Clone)]
pub struct Forest<C> {
    nodes: IndexMap<String, Node<C>>,
    roots: Vec<String>,
    index: ForestIndex,
}

impl<C> Default for Forest<C> {
    fn default() -> Self {
        Forest {
            nodes: IndexMap::new(),
            roots: Vec::new(),
            index: ForestIndex::default(),
        }
    }
}

impl<C: NodeContent> Forest<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn index(&self) -> &ForestIndex {
        &self.index
    }

    /// Recompute the parent/root index from the current shape.
    pub fn reindex(&mut self) {
        self.index = ForestIndex::build(&self.nodes, &self.roots);
    }

    pub fn find(&self, id: &str) -> Option<&Node<C>> {
        self.nodes.get(id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Node<C>> {
        self.nodes.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    fn require(&self, id: &str) -> Result<&Node<C>, StoreError> {
        self.nodes.get(id).ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn require_mut(&mut self, id: &str) -> Result<&mut Node<C>, StoreError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Nodes in pre-order
    pub fn iter(&self) -> impl Iterator<Item = &Node<C>> {
        self.index.preorder().iter().filter_map(|id| self.nodes.get(id))
    }

    /// Children of `id` as nodes, in order
    pub fn child_nodes(&self, id: &str) -> impl Iterator<Item = &Node<C>> {
        self.nodes
            .get(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|c| self.nodes.get(c))
    }

    /// Top-level nodes, in order
    pub fn root_nodes(&self) -> impl Iterator<Item = &Node<C>> {
        self.roots.iter().filter_map(|id| self.nodes.get(id))
    }

    /// Top-level ancestor of `id` (the node itself when it has no parent)
    pub fn root_of(&self, id: &str) -> Option<&Node<C>> {
        self.index.root_of(id).and_then(|r| self.nodes.get(r))
    }

    // -----------------------------------------------------------------------
    // Structural mutations
    // -----------------------------------------------------------------------

    /// Append a detached node as a new top-level node.
    pub fn add_root(&mut self, node: Node<C>) -> Result<String, StoreError> {
        self.insert_detached(None, node)
    }

    /// Append a detached node under `parent_id`.
    pub fn add_child(&mut self, parent_id: &str, node: Node<C>) -> Result<String, StoreError> {
        self.require(parent_id)?;
        self.insert_detached(Some(parent_id), node)
    }

    fn insert_detached(&mut self, parent_id: Option<&str>, mut node: Node<C>) -> Result<String, StoreError> {
        if self.nodes.contains_key(&node.id) {
            return Err(StoreError::DuplicateId(node.id));
        }
        // Detached nodes own no subtree of their own in the arena.
        node.children.clear();
        let id = node.id.clone();
        match parent_id {
            Some(parent) => {
                self.require_mut(parent)?.children.push(id.clone());
                node.color = None;
            }
            None => {
                if node.color.is_none() {
                    node.color = Some(root_color(&node.name, self.roots.len()).to_string());
                }
                self.roots.push(id.clone());
            }
        }
        self.nodes.insert(id.clone(), node);
        self.reindex();
        Ok(id)
    }

    pub fn rename(&mut self, id: &str, name: &str) -> Result<(), StoreError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::EmptyText);
        }
        self.require_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), StoreError> {
        self.require_mut(id)?.enabled = enabled;
        self.reindex();
        Ok(())
    }

    /// Delete a node and its whole subtree. Returns how many nodes were removed.
    pub fn remove(&mut self, id: &str) -> Result<usize, StoreError> {
        self.require(id)?;
        match self.index.parent_of(id).map(str::to_string) {
            Some(parent) => {
                if let Some(p) = self.nodes.get_mut(&parent) {
                    p.children.retain(|c| c != id);
                }
            }
            None => self.roots.retain(|r| r != id),
        }

        let mut removed = 0;
        let mut pending = vec![id.to_string()];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.shift_remove(&next) {
                pending.extend(node.children);
                removed += 1;
            }
        }
        self.reindex();
        Ok(removed)
    }

    /// Reparent `id` under `new_parent` (or to the top level when `None`) at
    /// `position` among its new siblings; positions past the end append.
    pub fn move_node(&mut self, id: &str, new_parent: Option<&str>, position: Option<usize>) -> Result<(), StoreError> {
        self.require(id)?;
        if let Some(parent) = new_parent {
            self.require(parent)?;
            if self.index.is_self_or_descendant(parent, id) {
                return Err(StoreError::InvalidMove(id.to_string()));
            }
        }

        match self.index.parent_of(id).map(str::to_string) {
            Some(old) => {
                if let Some(p) = self.nodes.get_mut(&old) {
                    p.children.retain(|c| c != id);
                }
            }
            None => self.roots.retain(|r| r != id),
        }

        let siblings = match new_parent {
            Some(parent) => &mut self.require_mut(parent)?.children,
            None => &mut self.roots,
        };
        let at = position.unwrap_or(siblings.len()).min(siblings.len());
        siblings.insert(at, id.to_string());

        if let Some(node) = self.nodes.get_mut(id) {
            match new_parent {
                Some(_) => node.color = None,
                None if node.color.is_none() => node.color = Some(root_color(&node.name, at).to_string()),
                None => {}
            }
        }
        self.reindex();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Closure queries
    // -----------------------------------------------------------------------

    /// True iff the node and every ancestor have their own flag set.
    /// Unknown IDs are not enabled.
    pub fn is_effectively_enabled(&self, id: &str) -> bool {
        match self.nodes.get(id) {
            Some(node) if node.enabled => {}
            _ => return false,
        }
        self.index
            .ancestors(id)
            .all(|a| self.nodes.get(a).is_some_and(|n| n.enabled))
    }

    /// Names from the root down to `id`, joined with `separator`
    pub fn breadcrumb(&self, id: &str, separator: &str) -> Option<String> {
        let node = self.nodes.get(id)?;
        let mut names: Vec<&str> = self
            .index
            .ancestors(id)
            .filter_map(|a| self.nodes.get(a).map(|n| n.name.as_str()))
            .collect();
        names.reverse();
        names.push(node.name.as_str());
        Some(names.join(separator))
    }

    /// Pre-order IDs of every effectively enabled node
    pub fn enabled_preorder(&self) -> Vec<String> {
        self.index
            .preorder()
            .iter()
            .filter(|id| self.is_effectively_enabled(id))
            .cloned()
            .collect()
    }

    /// Walk nodes in pre-order and return the first value `f` produces
    pub fn find_map<'a, T>(&'a self, mut f: impl FnMut(&'a Node<C>) -> Option<T>) -> Option<T> {
        self.iter().find_map(|n| f(n))
    }

    /// The ID of the node whose payload satisfies `pred`, in pre-order
    pub fn owner_of(&self, mut pred: impl FnMut(&C) -> bool) -> Option<String> {
        self.iter().find(|n| pred(&n.content)).map(|n| n.id.clone())
    }

    // -----------------------------------------------------------------------
    // Serialization edge
    // -----------------------------------------------------------------------

    /// Every node and leaf ID present in `records`, for seeding an ID source
    pub fn record_ids(records: &[NodeRecord<C>]) -> Vec<&str> {
        let mut out = Vec::new();
        let mut stack: Vec<&NodeRecord<C>> = records.iter().collect();
        while let Some(r) = stack.pop() {
            out.push(r.id.as_str());
            out.extend(r.content.leaf_ids());
            stack.extend(r.children.iter());
        }
        out
    }

    /// Build a forest from nested records, normalizing as it goes: blank or
    /// colliding IDs are replaced, blank names become "Untitled", payloads are
    /// repaired, top-level nodes without a color get one, and nested nodes lose theirs.
    pub fn from_records(records: Vec<NodeRecord<C>>, ids: &mut dyn IdSource, taken: &mut HashSet<String>) -> Self {
        let mut forest = Forest::new();
        let mut stack: Vec<(Option<String>, NodeRecord<C>)> =
            records.into_iter().rev().map(|r| (None, r)).collect();

        while let Some((parent, record)) = stack.pop() {
            let NodeRecord {
                mut id,
                name,
                enabled,
                color,
                children,
                mut content,
            } = record;
            claim_id(&mut id, C::NODE_PREFIX, ids, taken);
            content.normalize(ids, taken);
            let name = match name.trim() {
                "" => "Untitled".to_string(),
                trimmed => trimmed.to_string(),
            };

            let color = match (&parent, color) {
                (None, Some(c)) if !c.trim().is_empty() => Some(c),
                (None, _) => Some(root_color(&name, forest.roots.len()).to_string()),
                (Some(_), _) => None,
            };

            match &parent {
                Some(p) => {
                    if let Some(pn) = forest.nodes.get_mut(p) {
                        pn.children.push(id.clone());
                    }
                }
                None => forest.roots.push(id.clone()),
            }

            for child in children.into_iter().rev() {
                stack.push((Some(id.clone()), child));
            }
            forest.nodes.insert(
                id.clone(),
                Node {
                    id,
                    name,
                    enabled,
                    color,
                    children: Vec::new(),
                    content,
                },
            );
        }
        forest.reindex();
        forest
    }

    /// Nested records in document order
    pub fn to_records(&self) -> Vec<NodeRecord<C>> {
        self.roots.iter().filter_map(|id| self.record_for(id)).collect()
    }

    /// Nested record of one node and its whole subtree
    pub fn subtree(&self, id: &str) -> Option<NodeRecord<C>> {
        self.record_for(id)
    }

    fn record_for(&self, id: &str) -> Option<NodeRecord<C>> {
        let node = self.nodes.get(id)?;
        Some(NodeRecord {
            id: node.id.clone(),
            name: node.name.clone(),
            enabled: node.enabled,
            color: node.color.clone(),
            children: node.children.iter().filter_map(|c| self.record_for(c)).collect(),
            content: node.content.clone(),
        })
    }
}
