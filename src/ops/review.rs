use crate::model::forest::{Forest, Node, NodeContent};
use crate::model::review::{ResumeUpdate, ReviewResume};

/// Lifecycle of a review walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewPhase {
    /// No review running
    Idle,
    /// Cursor is on one of the captured units
    InProgress,
    /// Moved past the last unit
    Complete,
    /// Nothing eligible to review
    Empty,
}

/// Sequential walk over the effectively enabled nodes of a forest.
///
/// The order is captured when the review starts (or resumes) and stays
/// frozen while the tree changes underneath it; a unit deleted mid-review
/// simply has no node to show.
#[derive(Debug, Clone)]
pub struct Review {
    ordered_ids: Vec<String>,
    cursor: usize,
    phase: ReviewPhase,
}

impl Default for Review {
    fn default() -> Self {
        Review {
            ordered_ids: Vec::new(),
            cursor: 0,
            phase: ReviewPhase::Idle,
        }
    }
}

impl Review {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> ReviewPhase {
        self.phase
    }

    pub fn ordered_ids(&self) -> &[String] {
        &self.ordered_ids
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// `(1-based position, total)` while in progress
    pub fn progress(&self) -> Option<(usize, usize)> {
        match self.phase {
            ReviewPhase::InProgress => Some((self.cursor + 1, self.ordered_ids.len())),
            _ => None,
        }
    }

    /// ID under the cursor while in progress
    pub fn current_id(&self) -> Option<&str> {
        match self.phase {
            ReviewPhase::InProgress => self.ordered_ids.get(self.cursor).map(String::as_str),
            _ => None,
        }
    }

    /// Node under the cursor. `None` when idle, finished, or when the
    /// captured node has since been deleted; views show "review complete".
    pub fn current<'a, C: NodeContent>(&self, forest: &'a Forest<C>) -> Option<&'a Node<C>> {
        self.current_id().and_then(|id| forest.find(id))
    }

    fn resume_point(&self) -> ResumeUpdate {
        ResumeUpdate::Save(ReviewResume {
            active: true,
            idx: self.cursor,
            current_id: self.current_id().map(str::to_string),
        })
    }

    /// Capture the pre-order of effectively enabled nodes and put the cursor
    /// on the first one. An empty capture enters [`ReviewPhase::Empty`] and
    /// persists nothing.
    pub fn start<C: NodeContent>(&mut self, forest: &mut Forest<C>) -> ResumeUpdate {
        forest.reindex();
        self.ordered_ids = forest.enabled_preorder();
        self.cursor = 0;
        if self.ordered_ids.is_empty() {
            self.phase = ReviewPhase::Empty;
            return ResumeUpdate::Unchanged;
        }
        self.phase = ReviewPhase::InProgress;
        self.resume_point()
    }

    /// Step forward. Stepping past the last unit completes the review and
    /// clears the persisted resume point.
    pub fn advance(&mut self) -> ResumeUpdate {
        if self.phase != ReviewPhase::InProgress {
            return ResumeUpdate::Unchanged;
        }
        if self.cursor + 1 < self.ordered_ids.len() {
            self.cursor += 1;
            self.resume_point()
        } else {
            self.phase = ReviewPhase::Complete;
            ResumeUpdate::Clear
        }
    }

    /// Step back; never below the first unit.
    pub fn retreat(&mut self) -> ResumeUpdate {
        if self.phase != ReviewPhase::InProgress {
            return ResumeUpdate::Unchanged;
        }
        self.cursor = self.cursor.saturating_sub(1);
        self.resume_point()
    }

    /// Abandon the review.
    pub fn stop(&mut self) -> ResumeUpdate {
        let was_running = self.phase == ReviewPhase::InProgress;
        *self = Review::new();
        if was_running {
            ResumeUpdate::Clear
        } else {
            ResumeUpdate::Unchanged
        }
    }

    /// Rebuild a review from a persisted resume point against the current
    /// tree. The order is derived fresh; the saved node keeps its place when
    /// it still exists, otherwise the saved index is clamped into range.
    pub fn resume<C: NodeContent>(&mut self, forest: &mut Forest<C>, saved: Option<&ReviewResume>) -> ResumeUpdate {
        let Some(saved) = saved.filter(|s| s.active) else {
            *self = Review::new();
            return ResumeUpdate::Unchanged;
        };

        forest.reindex();
        self.ordered_ids = forest.enabled_preorder();
        if self.ordered_ids.is_empty() {
            self.cursor = 0;
            self.phase = ReviewPhase::Empty;
            return ResumeUpdate::Clear;
        }

        let by_id = saved
            .current_id
            .as_deref()
            .and_then(|id| self.ordered_ids.iter().position(|o| o == id));
        self.cursor = by_id.unwrap_or_else(|| saved.idx.min(self.ordered_ids.len() - 1));
        self.phase = ReviewPhase::InProgress;

        let update = self.resume_point();
        match &update {
            ResumeUpdate::Save(point) if point == saved => ResumeUpdate::Unchanged,
            _ => update,
        }
    }
}
