use chrono::{DateTime, Utc};

use crate::model::forest::{Node, StoreError};
use crate::model::ids::{QUESTION_PREFIX, TASK_PREFIX};
use crate::model::lenient::{clamp_priority, clean_tags};
use crate::model::store::Store;
use crate::model::thread::{Question, Task, ThreadContent, ThreadForest, ThreadNode};

fn non_blank(text: &str) -> Result<String, StoreError> {
    let text = text.trim();
    if text.is_empty() {
        Err(StoreError::EmptyText)
    } else {
        Ok(text.to_string())
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

/// A detached thread node with a fresh ID
pub fn create_node(store: &mut Store, name: &str) -> Result<ThreadNode, StoreError> {
    let name = non_blank(name)?;
    let id = store.next_node_id::<ThreadContent>();
    Ok(Node::new(id, name))
}

/// Create a node and attach it under `parent` (or at the top level).
/// Returns the new node's ID.
pub fn add_thread(store: &mut Store, parent: Option<&str>, name: &str) -> Result<String, StoreError> {
    if let Some(p) = parent
        && !store.threads.contains(p)
    {
        return Err(StoreError::NotFound(p.to_string()));
    }
    let node = create_node(store, name)?;
    match parent {
        Some(p) => store.threads.add_child(p, node),
        None => store.threads.add_root(node),
    }
}

fn content_mut<'a>(forest: &'a mut ThreadForest, node_id: &str) -> Result<&'a mut ThreadContent, StoreError> {
    forest
        .find_mut(node_id)
        .map(|n| &mut n.content)
        .ok_or_else(|| StoreError::NotFound(node_id.to_string()))
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

pub fn add_question(store: &mut Store, node_id: &str, text: &str) -> Result<String, StoreError> {
    let text = non_blank(text)?;
    if !store.threads.contains(node_id) {
        return Err(StoreError::NotFound(node_id.to_string()));
    }
    let id = store.next_id(QUESTION_PREFIX);
    content_mut(&mut store.threads, node_id)?
        .questions
        .push(Question::new(id.clone(), text));
    Ok(id)
}

pub fn edit_question(forest: &mut ThreadForest, node_id: &str, question_id: &str, text: &str) -> Result<(), StoreError> {
    let text = non_blank(text)?;
    let q = content_mut(forest, node_id)?
        .questions
        .iter_mut()
        .find(|q| q.id == question_id)
        .ok_or_else(|| StoreError::NotFound(question_id.to_string()))?;
    q.text = text;
    Ok(())
}

pub fn remove_question(forest: &mut ThreadForest, node_id: &str, question_id: &str) -> Result<(), StoreError> {
    let questions = &mut content_mut(forest, node_id)?.questions;
    let before = questions.len();
    questions.retain(|q| q.id != question_id);
    if questions.len() == before {
        return Err(StoreError::NotFound(question_id.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Field changes for a task. `None` leaves a field alone; for the two
/// timestamps `Some(None)` clears the value.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub text: Option<String>,
    pub priority: Option<i64>,
    pub contexts: Option<Vec<String>>,
    pub waiting_on: Option<String>,
    pub available_at: Option<Option<DateTime<Utc>>>,
    pub follow_up_at: Option<Option<DateTime<Utc>>>,
}

impl TaskPatch {
    fn apply(self, task: &mut Task) -> Result<(), StoreError> {
        if let Some(text) = self.text {
            task.text = non_blank(&text)?;
        }
        if let Some(p) = self.priority {
            task.priority = clamp_priority(p);
        }
        if let Some(contexts) = self.contexts {
            task.contexts = clean_tags(contexts);
        }
        if let Some(waiting) = self.waiting_on {
            task.waiting_on = waiting.trim().to_string();
        }
        if let Some(at) = self.available_at {
            task.available_at = at;
        }
        if let Some(at) = self.follow_up_at {
            task.follow_up_at = at;
        }
        Ok(())
    }
}

/// Add a task to a node. Fields in `patch` other than `text` are applied
/// to the new task. Returns the assigned task ID.
pub fn add_task(store: &mut Store, node_id: &str, text: &str, patch: TaskPatch) -> Result<String, StoreError> {
    let text = non_blank(text)?;
    if !store.threads.contains(node_id) {
        return Err(StoreError::NotFound(node_id.to_string()));
    }
    let id = store.next_id(TASK_PREFIX);
    let mut task = Task::new(id.clone(), text);
    TaskPatch { text: None, ..patch }.apply(&mut task)?;
    content_mut(&mut store.threads, node_id)?.tasks.push(task);
    Ok(id)
}

/// Locate a task anywhere in the forest; returns the owning node ID and the task.
pub fn find_task<'a>(forest: &'a ThreadForest, task_id: &str) -> Option<(&'a str, &'a Task)> {
    forest.find_map(|n| {
        n.content
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| (n.id(), t))
    })
}

pub fn find_task_mut<'a>(forest: &'a mut ThreadForest, task_id: &str) -> Option<&'a mut Task> {
    let owner = forest.owner_of(|c| c.tasks.iter().any(|t| t.id == task_id))?;
    forest
        .find_mut(&owner)?
        .content
        .tasks
        .iter_mut()
        .find(|t| t.id == task_id)
}

fn require_task<'a>(forest: &'a mut ThreadForest, task_id: &str) -> Result<&'a mut Task, StoreError> {
    find_task_mut(forest, task_id).ok_or_else(|| StoreError::NotFound(task_id.to_string()))
}

pub fn set_completed(forest: &mut ThreadForest, task_id: &str, completed: bool) -> Result<(), StoreError> {
    require_task(forest, task_id)?.completed = completed;
    Ok(())
}

pub fn edit_task(forest: &mut ThreadForest, task_id: &str, patch: TaskPatch) -> Result<(), StoreError> {
    let mut updated = require_task(forest, task_id)?.clone();
    // Validate on a copy so a rejected patch leaves the task untouched.
    patch.apply(&mut updated)?;
    *require_task(forest, task_id)? = updated;
    Ok(())
}

pub fn remove_task(forest: &mut ThreadForest, node_id: &str, task_id: &str) -> Result<(), StoreError> {
    let tasks = &mut content_mut(forest, node_id)?.tasks;
    let before = tasks.len();
    tasks.retain(|t| t.id != task_id);
    if tasks.len() == before {
        return Err(StoreError::NotFound(task_id.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_node() -> (Store, String) {
        let mut store = Store::new();
        let id = add_thread(&mut store, None, "Fitness").unwrap();
        (store, id)
    }

    #[test]
    fn create_node_defaults() {
        let mut store = Store::new();
        let node = create_node(&mut store, "  Reading ").unwrap();
        assert_eq!(node.id(), "N-001");
        assert_eq!(node.name(), "Reading");
        assert!(node.enabled());
        assert!(node.children().is_empty());
        assert!(node.content.questions.is_empty());
        assert!(node.content.tasks.is_empty());
    }

    #[test]
    fn blank_names_are_rejected() {
        let mut store = Store::new();
        assert_eq!(add_thread(&mut store, None, "   "), Err(StoreError::EmptyText));
        assert!(store.threads.is_empty());
    }

    #[test]
    fn add_under_missing_parent_is_not_found() {
        let mut store = Store::new();
        assert_eq!(
            add_thread(&mut store, Some("N-404"), "Orphan"),
            Err(StoreError::NotFound("N-404".into()))
        );
        assert!(store.threads.is_empty());
    }

    #[test]
    fn questions_add_edit_remove() {
        let (mut store, node) = store_with_node();
        let q = add_question(&mut store, &node, "When?").unwrap();
        edit_question(&mut store.threads, &node, &q, "When exactly?").unwrap();
        assert_eq!(store.threads.find(&node).unwrap().content.questions[0].text, "When exactly?");

        remove_question(&mut store.threads, &node, &q).unwrap();
        assert_eq!(
            remove_question(&mut store.threads, &node, &q),
            Err(StoreError::NotFound(q.clone()))
        );
    }

    #[test]
    fn add_task_applies_patch_and_clamps() {
        let (mut store, node) = store_with_node();
        let id = add_task(
            &mut store,
            &node,
            "Run 5k",
            TaskPatch {
                priority: Some(12),
                contexts: Some(vec!["gym".into(), " gym ".into(), "".into()]),
                waiting_on: Some("  ".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let (owner, task) = find_task(&store.threads, &id).unwrap();
        assert_eq!(owner, node);
        assert_eq!(task.priority, 5);
        assert_eq!(task.contexts, vec!["gym"]);
        assert!(!task.is_waiting());
    }

    #[test]
    fn completing_and_editing_tasks() {
        let (mut store, node) = store_with_node();
        let id = add_task(&mut store, &node, "Stretch", TaskPatch::default()).unwrap();
        set_completed(&mut store.threads, &id, true).unwrap();
        assert!(find_task(&store.threads, &id).unwrap().1.completed);

        let rejected = edit_task(
            &mut store.threads,
            &id,
            TaskPatch {
                text: Some(" ".into()),
                priority: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(rejected, Err(StoreError::EmptyText));
        assert_eq!(find_task(&store.threads, &id).unwrap().1.priority, 3);

        assert_eq!(
            set_completed(&mut store.threads, "T-999", true),
            Err(StoreError::NotFound("T-999".into()))
        );
    }

    #[test]
    fn remove_task_from_node() {
        let (mut store, node) = store_with_node();
        let id = add_task(&mut store, &node, "Stretch", TaskPatch::default()).unwrap();
        remove_task(&mut store.threads, &node, &id).unwrap();
        assert!(find_task(&store.threads, &id).is_none());
        assert!(remove_task(&mut store.threads, &node, &id).is_err());
    }
}
