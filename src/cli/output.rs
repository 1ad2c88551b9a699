use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::Serialize;

use crate::model::forest::{Forest, Node, NodeContent};
use crate::model::pantry::{Item, ItemStatus, PantryContent};
use crate::model::review::ForestKind;
use crate::model::thread::{Task, ThreadContent};
use crate::ops::aggregate::{ShoppingGroup, TaskRow};
use crate::ops::review::{Review, ReviewPhase};
use crate::util::text::truncate_to_width;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct IdJson {
    pub id: String,
}

#[derive(Serialize)]
pub struct RemovedJson {
    pub id: String,
    pub removed: usize,
}

#[derive(Serialize)]
pub struct TaskRowJson {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub priority: u8,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub contexts: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub waiting_on: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_at: Option<String>,
    pub node_id: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Serialize)]
pub struct ShoppingGroupJson {
    pub category_id: String,
    pub path: String,
    pub items: Vec<ShoppingItemJson>,
}

#[derive(Serialize)]
pub struct ShoppingItemJson {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

#[derive(Serialize)]
pub struct ReviewJson {
    pub forest: ForestKind,
    pub phase: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn task_row_to_json(row: &TaskRow<'_>, forest: &Forest<ThreadContent>, separator: &str) -> TaskRowJson {
    let task = row.entry.leaf;
    TaskRowJson {
        id: task.id.clone(),
        text: task.text.clone(),
        completed: task.completed,
        priority: task.priority,
        available: row.is_available(),
        reason: row.reason.as_ref().map(ToString::to_string),
        contexts: task.contexts.clone(),
        waiting_on: task.waiting_on.clone(),
        available_at: task.available_at.map(rfc3339),
        follow_up_at: task.follow_up_at.map(rfc3339),
        node_id: row.entry.node.id().to_string(),
        path: forest.breadcrumb(row.entry.node.id(), separator).unwrap_or_default(),
        color: row.entry.root.color().map(str::to_string),
    }
}

pub fn shopping_to_json(groups: &[ShoppingGroup<'_>]) -> Vec<ShoppingGroupJson> {
    groups
        .iter()
        .map(|g| ShoppingGroupJson {
            category_id: g.category_id.to_string(),
            path: g.path.clone(),
            items: g
                .items
                .iter()
                .map(|i| ShoppingItemJson {
                    id: i.id.clone(),
                    name: i.name.clone(),
                    notes: i.notes.clone(),
                })
                .collect(),
        })
        .collect()
}

pub fn phase_name(phase: ReviewPhase) -> &'static str {
    match phase {
        ReviewPhase::Idle => "idle",
        ReviewPhase::InProgress => "in_progress",
        ReviewPhase::Complete => "complete",
        ReviewPhase::Empty => "empty",
    }
}

pub fn review_to_json<C: NodeContent>(kind: ForestKind, review: &Review, forest: &Forest<C>, separator: &str) -> ReviewJson {
    let node = review.current(forest);
    let progress = review.progress();
    ReviewJson {
        forest: kind,
        phase: phase_name(review.phase()),
        position: progress.map(|(p, _)| p),
        total: progress.map(|(_, t)| t),
        node_id: node.map(|n| n.id().to_string()),
        path: node.and_then(|n| forest.breadcrumb(n.id(), separator)),
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

fn local_time(t: DateTime<Utc>) -> String {
    t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn checkbox(done: bool) -> &'static str {
    if done { "[x]" } else { "[ ]" }
}

/// Indented tree, one node per line. Roots carry their color; nodes whose
/// own flag is off are marked `(disabled)`, and nodes hidden only by an
/// ancestor are marked `(hidden)`.
pub fn format_tree<C: NodeContent>(forest: &Forest<C>, width: usize, summary: impl Fn(&C) -> String) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack: Vec<(&Node<C>, usize)> = forest.root_nodes().map(|n| (n, 0)).collect();
    stack.reverse();
    while let Some((node, depth)) = stack.pop() {
        let mut line = format!("{}{} {}", "  ".repeat(depth), node.id(), truncate_to_width(node.name(), width));
        if depth == 0
            && let Some(color) = node.color()
        {
            line.push_str(&format!(" {}", color));
        }
        let details = summary(&node.content);
        if !details.is_empty() {
            line.push_str(&format!("  {}", details));
        }
        if !node.enabled() {
            line.push_str("  (disabled)");
        } else if !forest.is_effectively_enabled(node.id()) {
            line.push_str("  (hidden)");
        }
        lines.push(line);

        let children: Vec<&Node<C>> = forest.child_nodes(node.id()).collect();
        stack.extend(children.into_iter().rev().map(|c| (c, depth + 1)));
    }
    lines
}

pub fn thread_summary(content: &ThreadContent) -> String {
    let mut parts = Vec::new();
    if !content.questions.is_empty() {
        parts.push(format!("{}q", content.questions.len()));
    }
    let open = content.tasks.iter().filter(|t| !t.completed).count();
    if !content.tasks.is_empty() {
        parts.push(format!("{}/{} tasks open", open, content.tasks.len()));
    }
    parts.join(", ")
}

pub fn pantry_summary(content: &PantryContent) -> String {
    if content.items.is_empty() {
        return String::new();
    }
    let to_buy = content
        .items
        .iter()
        .filter(|i| i.status == ItemStatus::ToBuy)
        .count();
    format!("{} items, {} to buy", content.items.len(), to_buy)
}

/// `[ ] T-004 p2 Swim  (Needs context: pool)`
pub fn format_task_line(task: &Task, width: usize) -> String {
    let mut line = format!(
        "{} {} p{} {}",
        checkbox(task.completed),
        task.id,
        task.priority,
        truncate_to_width(&task.text, width)
    );
    if !task.contexts.is_empty() {
        let tags: Vec<String> = task.contexts.iter().map(|c| format!("@{}", c)).collect();
        line.push_str(&format!(" {}", tags.join(" ")));
    }
    line
}

/// Unified task view: one line per task, its location underneath.
pub fn format_task_rows(rows: &[TaskRow<'_>], forest: &Forest<ThreadContent>, separator: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for row in rows {
        let mut line = format_task_line(row.entry.leaf, width);
        if let Some(reason) = &row.reason {
            line.push_str(&format!("  ({})", reason));
        }
        lines.push(line);

        let path = forest
            .breadcrumb(row.entry.node.id(), separator)
            .unwrap_or_else(|| row.entry.node.name().to_string());
        let mut location = format!("      {}", path);
        if let Some(at) = row.entry.leaf.follow_up_at {
            location.push_str(&format!("  follow up {}", local_time(at)));
        }
        lines.push(location);
    }
    lines
}

pub fn format_item_line(item: &Item) -> String {
    let mut line = format!("{} {} [{}]", item.id, item.name, item.status);
    if !item.notes.is_empty() {
        line.push_str(&format!(": {}", item.notes));
    }
    line
}

pub fn format_shopping(groups: &[ShoppingGroup<'_>]) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, group) in groups.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        lines.push(format!("== {} ==", group.path));
        for item in &group.items {
            let mut line = format!("[ ] {} {}", item.id, item.name);
            if !item.notes.is_empty() {
                line.push_str(&format!(" ({})", item.notes));
            }
            lines.push(line);
        }
    }
    lines
}

/// `[■■□□□] 2/5`
pub fn format_progress(position: usize, total: usize) -> String {
    let done = position.min(total);
    format!("[{}{}] {}/{}", "■".repeat(done), "□".repeat(total - done), position, total)
}

/// The card for the node under the review cursor, or the message for the
/// current phase.
pub fn format_review_card<C: NodeContent>(
    review: &Review,
    forest: &Forest<C>,
    separator: &str,
    body: impl Fn(&C) -> Vec<String>,
) -> Vec<String> {
    match review.phase() {
        ReviewPhase::Idle => return vec!["No review in progress. Start one with `daymx review start`.".to_string()],
        ReviewPhase::Empty => return vec!["Nothing to review: no enabled nodes.".to_string()],
        ReviewPhase::Complete => return vec!["Review complete.".to_string()],
        ReviewPhase::InProgress => {}
    }

    let mut lines = Vec::new();
    if let Some((position, total)) = review.progress() {
        lines.push(format_progress(position, total));
    }
    let Some(node) = review.current(forest) else {
        // Node deleted since the review captured its order.
        lines.push("Review complete.".to_string());
        return lines;
    };
    lines.push(forest.breadcrumb(node.id(), separator).unwrap_or_else(|| node.name().to_string()));
    lines.extend(body(&node.content));
    lines
}

pub fn thread_card(content: &ThreadContent) -> Vec<String> {
    let mut lines = Vec::new();
    if !content.questions.is_empty() {
        lines.push("Questions:".to_string());
        for q in &content.questions {
            lines.push(format!("  ? {}", q.text));
        }
    }
    if !content.tasks.is_empty() {
        lines.push("Tasks:".to_string());
        for t in &content.tasks {
            lines.push(format!("  {}", format_task_line(t, 0)));
        }
    }
    if lines.is_empty() {
        lines.push("(no questions or tasks)".to_string());
    }
    lines
}

pub fn pantry_card(content: &PantryContent) -> Vec<String> {
    if content.items.is_empty() {
        return vec!["(no items)".to_string()];
    }
    content.items.iter().map(|i| format!("  {}", format_item_line(i))).collect()
}
