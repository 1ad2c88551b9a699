use std::collections::HashMap;

use indexmap::IndexMap;

use super::forest::Node;

/// Parent and root pointers derived from a forest snapshot.
///
/// Built by one pre-order traversal; every structural mutation of the
/// owning [`Forest`](super::forest::Forest) rebuilds it before returning.
#[derive(Debug, Clone, Default)]
pub struct ForestIndex {
    parent_of: HashMap<String, String>,
    root_of: HashMap<String, String>,
    preorder: Vec<String>,
}

impl ForestIndex {
    /// Walk every tree from `roots` downwards. A top-level node is its own
    /// root; each child inherits its parent's root.
    pub fn build<C>(nodes: &IndexMap<String, Node<C>>, roots: &[String]) -> Self {
        let mut index = ForestIndex {
            parent_of: HashMap::with_capacity(nodes.len()),
            root_of: HashMap::with_capacity(nodes.len()),
            preorder: Vec::with_capacity(nodes.len()),
        };

        let mut stack: Vec<(&str, &str)> = roots.iter().rev().map(|r| (r.as_str(), r.as_str())).collect();
        while let Some((id, root)) = stack.pop() {
            let Some(node) = nodes.get(id) else {
                continue;
            };
            index.root_of.insert(id.to_string(), root.to_string());
            index.preorder.push(id.to_string());
            for child in node.children().iter().rev() {
                index.parent_of.insert(child.clone(), id.to_string());
                stack.push((child.as_str(), root));
            }
        }
        index
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.parent_of.get(id).map(String::as_str)
    }

    pub fn root_of(&self, id: &str) -> Option<&str> {
        self.root_of.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.root_of.contains_key(id)
    }

    /// Node IDs in pre-order (parents before children, siblings in order)
    pub fn preorder(&self) -> &[String] {
        &self.preorder
    }

    /// Ancestors of `id`, nearest first. Does not include `id` itself.
    pub fn ancestors<'a>(&'a self, id: &'a str) -> Ancestors<'a> {
        Ancestors {
            index: self,
            current: self.parent_of(id),
        }
    }

    /// Whether `candidate` is `id` or lies beneath it
    pub fn is_self_or_descendant(&self, candidate: &str, id: &str) -> bool {
        candidate == id || self.ancestors(candidate).any(|a| a == id)
    }
}

/// Iterator over the ancestor chain of a node
pub struct Ancestors<'a> {
    index: &'a ForestIndex,
    current: Option<&'a str>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let id = self.current?;
        self.current = self.index.parent_of(id);
        Some(id)
    }
}
