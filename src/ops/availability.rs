use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};

use crate::model::thread::Task;

/// Why a task is not actionable right now. Only the first failing gate is
/// reported, in this order: blocked, not yet available, wrong context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unavailable<'a> {
    /// `waiting_on` names someone or something
    Blocked(&'a str),
    /// `available_at` lies in the future
    NotYet(DateTime<Utc>),
    /// The active context is not among the task's contexts
    WrongContext(&'a [String]),
}

impl fmt::Display for Unavailable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailable::Blocked(who) => write!(f, "Blocked by {}", who),
            Unavailable::NotYet(at) => write!(
                f,
                "Available at {}",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            ),
            Unavailable::WrongContext(contexts) => write!(f, "Needs context: {}", contexts.join(", ")),
        }
    }
}

/// First failing availability gate, or `None` when the task is available.
pub fn unavailable_reason<'a>(task: &'a Task, now: DateTime<Utc>, active_context: Option<&str>) -> Option<Unavailable<'a>> {
    let waiting = task.waiting_on.trim();
    if !waiting.is_empty() {
        return Some(Unavailable::Blocked(waiting));
    }
    if let Some(at) = task.available_at
        && now < at
    {
        return Some(Unavailable::NotYet(at));
    }
    if !task.contexts.is_empty() {
        let fits = active_context.is_some_and(|c| task.contexts.iter().any(|t| t == c));
        if !fits {
            return Some(Unavailable::WrongContext(&task.contexts));
        }
    }
    None
}

/// A task is available iff it is not waiting on anyone, its start time has
/// passed (or it has none), and it has no contexts or includes the active one.
pub fn is_available(task: &Task, now: DateTime<Utc>, active_context: Option<&str>) -> bool {
    unavailable_reason(task, now, active_context).is_none()
}

/// View-level context filter
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ContextFilter {
    #[default]
    Any,
    Only(String),
}

impl FromStr for ContextFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("any") {
            Ok(ContextFilter::Any)
        } else {
            Ok(ContextFilter::Only(s.to_string()))
        }
    }
}

/// Context-agnostic tasks pass every filter; tagged tasks pass `Any` or a
/// filter naming one of their tags.
pub fn passes_context_filter(task: &Task, filter: &ContextFilter) -> bool {
    if task.contexts.is_empty() {
        return true;
    }
    match filter {
        ContextFilter::Any => true,
        ContextFilter::Only(c) => task.contexts.iter().any(|t| t == c),
    }
}

/// Task-view order: available first, then priority ascending, then
/// `available_at` ascending with absent values last.
pub fn compare_tasks(a: &Task, b: &Task, now: DateTime<Utc>, active_context: Option<&str>) -> Ordering {
    let blocked = |t: &Task| (!is_available(t, now, active_context)) as u8;
    blocked(a)
        .cmp(&blocked(b))
        .then(a.priority.cmp(&b.priority))
        .then_with(|| match (a.available_at, b.available_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Stable sort of any task-bearing entries by [`compare_tasks`]; ties keep input order.
pub fn sort_by_availability<T>(entries: &mut [T], task_of: impl Fn(&T) -> &Task, now: DateTime<Utc>, active_context: Option<&str>) {
    entries.sort_by(|a, b| compare_tasks(task_of(a), task_of(b), now, active_context));
}
