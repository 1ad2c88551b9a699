use std::time::{Duration, Instant};

/// Single-slot write coalescer. Every change re-arms one deadline; the
/// write happens once the store has been quiet for the whole window, or
/// right away when flushed.
#[derive(Debug, Clone)]
pub struct SaveQueue {
    window: Duration,
    deadline: Option<Instant>,
}

impl SaveQueue {
    pub fn new(window: Duration) -> Self {
        SaveQueue { window, deadline: None }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Mark the store dirty as of `now`, replacing any earlier deadline.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the pending write if its window has elapsed.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(due) if now >= due => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Consume the pending write regardless of the window.
    pub fn take(&mut self) -> bool {
        self.deadline.take().is_some()
    }
}
