use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::model::forest::{Forest, Node, NodeContent};
use crate::model::pantry::{Item, ItemStatus, PantryContent, PantryForest};
use crate::model::thread::{Task, ThreadContent, ThreadForest};
use crate::ops::availability::{ContextFilter, Unavailable, passes_context_filter, sort_by_availability, unavailable_reason};

/// A leaf record together with the node that owns it and that node's root
#[derive(Debug)]
pub struct Entry<'a, C, L> {
    pub leaf: &'a L,
    pub node: &'a Node<C>,
    pub root: &'a Node<C>,
}

// Manual impls: derive would demand `C: Clone` and `L: Clone`.
impl<C, L> Clone for Entry<'_, C, L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C, L> Copy for Entry<'_, C, L> {}

pub type TaskEntry<'a> = Entry<'a, ThreadContent, Task>;
pub type ItemEntry<'a> = Entry<'a, PantryContent, Item>;

/// Collect leaves in traversal order. A disabled node prunes its whole
/// subtree: the walk never descends into it.
pub fn flatten<'a, C, L>(forest: &'a Forest<C>, leaves: impl Fn(&'a C) -> &'a [L]) -> Vec<Entry<'a, C, L>>
where
    C: NodeContent,
{
    let mut out = Vec::new();
    for root in forest.root_nodes() {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if !node.enabled() {
                continue;
            }
            for leaf in leaves(&node.content) {
                out.push(Entry { leaf, node, root });
            }
            let children: Vec<&Node<C>> = forest.child_nodes(node.id()).collect();
            stack.extend(children.into_iter().rev());
        }
    }
    out
}

/// Every task of every effectively enabled thread node, in document order
pub fn flatten_tasks(forest: &ThreadForest) -> Vec<TaskEntry<'_>> {
    flatten(forest, |c| c.tasks.as_slice())
}

/// Every item of every effectively enabled category, in document order
pub fn flatten_items(forest: &PantryForest) -> Vec<ItemEntry<'_>> {
    flatten(forest, |c| c.items.as_slice())
}

// ---------------------------------------------------------------------------
// Unified task view
// ---------------------------------------------------------------------------

/// Inputs to the unified task view
#[derive(Debug, Clone)]
pub struct TaskQuery {
    pub filter: ContextFilter,
    pub active_context: Option<String>,
    pub include_completed: bool,
    pub now: DateTime<Utc>,
}

/// One row of the unified task view
#[derive(Debug, Clone)]
pub struct TaskRow<'a> {
    pub entry: TaskEntry<'a>,
    /// `None` when the task is available
    pub reason: Option<Unavailable<'a>>,
}

impl TaskRow<'_> {
    pub fn is_available(&self) -> bool {
        self.reason.is_none()
    }
}

/// Filter and sort the aggregated tasks for display.
pub fn task_view<'a>(forest: &'a ThreadForest, query: &TaskQuery) -> Vec<TaskRow<'a>> {
    let active = query.active_context.as_deref();
    let mut entries: Vec<TaskEntry<'a>> = flatten_tasks(forest)
        .into_iter()
        .filter(|e| query.include_completed || !e.leaf.completed)
        .filter(|e| passes_context_filter(e.leaf, &query.filter))
        .collect();
    sort_by_availability(&mut entries, |e| e.leaf, query.now, active);
    entries
        .into_iter()
        .map(|entry| TaskRow {
            entry,
            reason: unavailable_reason(entry.leaf, query.now, active),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Shopping list
// ---------------------------------------------------------------------------

/// To-buy items of one category, headed by its breadcrumb
#[derive(Debug, Clone)]
pub struct ShoppingGroup<'a> {
    pub category_id: &'a str,
    pub path: String,
    pub items: Vec<&'a Item>,
}

/// `to_buy` items of enabled categories, grouped by category in first-seen order.
pub fn shopping_list<'a>(forest: &'a PantryForest, separator: &str) -> Vec<ShoppingGroup<'a>> {
    let mut groups: IndexMap<&'a str, ShoppingGroup<'a>> = IndexMap::new();
    for entry in flatten_items(forest) {
        if entry.leaf.status != ItemStatus::ToBuy {
            continue;
        }
        let category_id = entry.node.id();
        groups
            .entry(category_id)
            .or_insert_with(|| ShoppingGroup {
                category_id,
                path: forest
                    .breadcrumb(category_id, separator)
                    .unwrap_or_else(|| entry.node.name().to_string()),
                items: Vec::new(),
            })
            .items
            .push(entry.leaf);
    }
    groups.into_values().collect()
}
