use std::fmt;

use serde::{Deserialize, Serialize};

/// Which forest a review walks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForestKind {
    Threads,
    Pantry,
}

impl fmt::Display for ForestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForestKind::Threads => write!(f, "threads"),
            ForestKind::Pantry => write!(f, "pantry"),
        }
    }
}

/// Persisted resume point of a review in progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResume {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub idx: usize,
    #[serde(default)]
    pub current_id: Option<String>,
}

/// What the review sequencer asks its caller to persist after a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeUpdate {
    Save(ReviewResume),
    Clear,
    Unchanged,
}
