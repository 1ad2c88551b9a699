use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::io::recovery::atomic_write;
use crate::model::review::{ForestKind, ReviewResume};

/// Review resume points, kept in `.review.json` apart from the tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStateFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<ReviewResume>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pantry: Option<ReviewResume>,
}

impl ReviewStateFile {
    pub fn get(&self, kind: ForestKind) -> Option<&ReviewResume> {
        match kind {
            ForestKind::Threads => self.threads.as_ref(),
            ForestKind::Pantry => self.pantry.as_ref(),
        }
    }

    pub fn set(&mut self, kind: ForestKind, resume: Option<ReviewResume>) {
        match kind {
            ForestKind::Threads => self.threads = resume,
            ForestKind::Pantry => self.pantry = resume,
        }
    }
}

pub fn review_state_path(data_dir: &Path) -> PathBuf {
    data_dir.join(".review.json")
}

/// Read `.review.json`; a missing or malformed file reads as no reviews.
pub fn read_review_state(data_dir: &Path) -> ReviewStateFile {
    fs::read_to_string(review_state_path(data_dir))
        .ok()
        .and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

pub fn write_review_state(data_dir: &Path, state: &ReviewStateFile) -> std::io::Result<()> {
    let content = serde_json::to_string_pretty(state)?;
    atomic_write(&review_state_path(data_dir), content.as_bytes())
}
