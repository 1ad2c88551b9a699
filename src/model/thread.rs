use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::forest::{Forest, Node, NodeContent};
use super::ids::{IdSource, NODE_PREFIX, QUESTION_PREFIX, TASK_PREFIX, claim_id};
use super::lenient::{self, PRIORITY_DEFAULT};

/// A free-form question attached to a thread node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub text: String,
}

impl Question {
    pub fn new(id: String, text: String) -> Self {
        Question { id, text }
    }
}

/// An actionable task attached to a thread node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub text: String,
    #[serde(default, deserialize_with = "lenient::bool_false")]
    pub completed: bool,
    /// 1 (most urgent) to 5
    #[serde(default = "lenient::default_priority", deserialize_with = "lenient::priority")]
    pub priority: u8,
    /// Not actionable before this instant
    #[serde(default, with = "lenient::millis")]
    pub available_at: Option<DateTime<Utc>>,
    /// Context tags; empty means the task fits any context
    #[serde(default, deserialize_with = "lenient::contexts")]
    pub contexts: Vec<String>,
    /// Who or what the task is waiting on; blank means not blocked
    #[serde(default, deserialize_with = "lenient::string")]
    pub waiting_on: String,
    #[serde(default, with = "lenient::millis")]
    pub follow_up_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: String, text: String) -> Self {
        Task {
            id,
            text,
            completed: false,
            priority: PRIORITY_DEFAULT,
            available_at: None,
            contexts: Vec::new(),
            waiting_on: String::new(),
            follow_up_at: None,
        }
    }

    /// Whether `waiting_on` names a blocker
    pub fn is_waiting(&self) -> bool {
        !self.waiting_on.trim().is_empty()
    }

    fn normalize(&mut self) {
        self.priority = lenient::clamp_priority(self.priority as i64);
        self.contexts = lenient::clean_tags(&self.contexts);
        if !self.is_waiting() {
            self.waiting_on.clear();
        }
    }
}

/// Leaf payload of a thread node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadContent {
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub questions: Vec<Question>,
    #[serde(default, deserialize_with = "lenient::null_default")]
    pub tasks: Vec<Task>,
}

impl NodeContent for ThreadContent {
    const NODE_PREFIX: &'static str = NODE_PREFIX;

    fn leaf_ids(&self) -> Vec<&str> {
        self.questions
            .iter()
            .map(|q| q.id.as_str())
            .chain(self.tasks.iter().map(|t| t.id.as_str()))
            .collect()
    }

    fn normalize(&mut self, ids: &mut dyn IdSource, taken: &mut HashSet<String>) {
        for q in &mut self.questions {
            claim_id(&mut q.id, QUESTION_PREFIX, ids, taken);
        }
        for t in &mut self.tasks {
            claim_id(&mut t.id, TASK_PREFIX, ids, taken);
            t.normalize();
        }
    }
}

pub type ThreadNode = Node<ThreadContent>;
pub type ThreadForest = Forest<ThreadContent>;
