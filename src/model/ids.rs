use std::collections::{HashMap, HashSet};

/// Prefix for thread node IDs (`N-001`)
pub const NODE_PREFIX: &str = "N";
/// Prefix for question IDs (`Q-001`)
pub const QUESTION_PREFIX: &str = "Q";
/// Prefix for task IDs (`T-001`)
pub const TASK_PREFIX: &str = "T";
/// Prefix for pantry category IDs (`C-001`)
pub const CATEGORY_PREFIX: &str = "C";
/// Prefix for pantry item IDs (`I-001`)
pub const ITEM_PREFIX: &str = "I";

/// Opaque unique-ID generator.
pub trait IdSource {
    fn next_id(&mut self, prefix: &str) -> String;
}

/// Hands out `PREFIX-NNN` IDs, continuing after the highest number observed
/// for each prefix. IDs of any other shape are ignored when seeding, but no
/// observed or issued ID is ever handed out again.
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: HashMap<String, u64>,
    issued: HashSet<String>,
    overflow: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an existing ID so later allocations never reuse it or its number.
    pub fn observe(&mut self, id: &str) {
        self.issued.insert(id.to_string());
        if let Some((prefix, num)) = id.split_once('-')
            && !prefix.is_empty()
            && let Ok(n) = num.parse::<u64>()
            && let Some(after) = n.checked_add(1)
        {
            let slot = self.next.entry(prefix.to_string()).or_insert(1);
            if after > *slot {
                *slot = after;
            }
        }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self, prefix: &str) -> String {
        loop {
            let slot = self.next.entry(prefix.to_string()).or_insert(1);
            let id = match slot.checked_add(1) {
                Some(after) => {
                    let id = format!("{}-{:03}", prefix, slot);
                    *slot = after;
                    id
                }
                // Counter exhausted: number the spill-over separately
                None => {
                    self.overflow += 1;
                    format!("{}-{}-{}", prefix, u64::MAX, self.overflow)
                }
            };
            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}

/// Fresh IDs requested from the source before falling back to suffixes.
const CLAIM_ATTEMPTS: usize = 64;

/// Make `id` usable: keep it when non-blank and unclaimed, otherwise replace
/// it with a fresh ID. The final value is added to `taken`.
pub fn claim_id(id: &mut String, prefix: &str, ids: &mut dyn IdSource, taken: &mut HashSet<String>) {
    let trimmed = id.trim();
    if !trimmed.is_empty() && !taken.contains(trimmed) {
        *id = trimmed.to_string();
        taken.insert(id.clone());
        return;
    }
    for _ in 0..CLAIM_ATTEMPTS {
        let fresh = ids.next_id(prefix);
        if taken.insert(fresh.clone()) {
            *id = fresh;
            return;
        }
    }
    // The source keeps repeating itself; number off a suffix instead
    let base = ids.next_id(prefix);
    let mut suffix = 2u64;
    loop {
        let candidate = format!("{}-{}", base, suffix);
        if taken.insert(candidate.clone()) {
            *id = candidate;
            return;
        }
        suffix += 1;
    }
}
