use std::collections::HashSet;

use super::forest::{Forest, NodeContent};
use super::ids::{IdSource, SequentialIds};
use super::pantry::PantryForest;
use super::snapshot::{PantrySnapshot, Snapshot};
use super::thread::ThreadForest;

/// The in-memory data model: the thread forest, the pantry forest, and the
/// ID source shared by both.
#[derive(Debug, Clone, Default)]
pub struct Store {
    pub threads: ThreadForest,
    pub pantry: PantryForest,
    pub ids: SequentialIds,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a loaded document, normalizing every record.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut ids = SequentialIds::new();
        for id in ThreadForest::record_ids(&snapshot.threads)
            .into_iter()
            .chain(PantryForest::record_ids(&snapshot.pantry.categories))
        {
            ids.observe(id);
        }

        let mut taken = HashSet::new();
        let threads = Forest::from_records(snapshot.threads, &mut ids, &mut taken);
        let pantry = Forest::from_records(snapshot.pantry.categories, &mut ids, &mut taken);
        Store { threads, pantry, ids }
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            threads: self.threads.to_records(),
            pantry: PantrySnapshot {
                categories: self.pantry.to_records(),
            },
        }
    }

    pub fn next_id(&mut self, prefix: &str) -> String {
        self.ids.next_id(prefix)
    }

    /// Fresh node ID for the forest holding payload `C`
    pub fn next_node_id<C: NodeContent>(&mut self) -> String {
        self.ids.next_id(C::NODE_PREFIX)
    }
}
