use std::time::{Duration, Instant};

use crate::io::backend::{Backend, PersistError};
use crate::io::recovery::{RecoveryCategory, RecoveryEntry};
use crate::io::save_queue::SaveQueue;
use crate::model::forest::StoreError;
use crate::model::review::{ForestKind, ResumeUpdate};
use crate::model::snapshot::Snapshot;
use crate::model::store::Store;
use crate::ops::review::{Review, ReviewPhase};

/// What a [`Session::tick`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    /// A remote document replaced the local model
    pub replaced: bool,
    /// The pending debounced write was sent
    pub saved: bool,
}

/// Owns the model and everything that keeps it persisted: the backend, the
/// debounced save queue, and one review per forest.
///
/// Every mutation goes through [`Session::mutate`], which rebuilds both
/// indexes before returning and then either writes immediately or arms the
/// save queue, depending on the backend. Persistence failures never reach
/// the caller as errors; the latest one is kept for display.
pub struct Session<B: Backend> {
    store: Store,
    backend: B,
    queue: SaveQueue,
    thread_review: Review,
    pantry_review: Review,
    last_persist_error: Option<String>,
}

impl<B: Backend> Session<B> {
    /// Load the backend's document and resume any review left in progress.
    /// A resume point that no longer matches the tree is rewritten or cleared.
    pub fn open(backend: B, debounce: Duration) -> Self {
        Self::load(backend, debounce, true)
    }

    /// Like [`Session::open`], but resumed reviews live only in memory and
    /// the backend's resume points are left as they are.
    pub fn open_read_only(backend: B, debounce: Duration) -> Self {
        Self::load(backend, debounce, false)
    }

    fn load(backend: B, debounce: Duration, persist_resume: bool) -> Self {
        let mut session = Session {
            store: Store::new(),
            backend,
            queue: SaveQueue::new(debounce),
            thread_review: Review::new(),
            pantry_review: Review::new(),
            last_persist_error: None,
        };
        session.store = Store::from_snapshot(session.backend.load());
        for kind in [ForestKind::Threads, ForestKind::Pantry] {
            let saved = session.backend.load_resume(kind);
            let update = match kind {
                ForestKind::Threads => session.thread_review.resume(&mut session.store.threads, saved.as_ref()),
                ForestKind::Pantry => session.pantry_review.resume(&mut session.store.pantry, saved.as_ref()),
            };
            if persist_resume {
                session.apply_resume(kind, update);
            }
        }
        session
    }

    /// Start receiving remote documents; they are applied by [`Session::tick`].
    pub fn subscribe(&mut self) -> Result<(), PersistError> {
        self.backend.subscribe()
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }

    pub fn has_pending_write(&self) -> bool {
        self.queue.is_pending()
    }

    fn note_error(&mut self, e: PersistError) {
        self.last_persist_error = Some(e.to_string());
    }

    // -----------------------------------------------------------------------
    // Mutation and persistence
    // -----------------------------------------------------------------------

    /// Apply one user action. On error nothing is persisted.
    pub fn mutate<T>(&mut self, now: Instant, f: impl FnOnce(&mut Store) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let value = f(&mut self.store)?;
        self.store.threads.reindex();
        self.store.pantry.reindex();
        if self.backend.debounced() {
            self.queue.schedule(now);
        } else {
            self.write();
        }
        Ok(value)
    }

    pub fn mutate_now<T>(&mut self, f: impl FnOnce(&mut Store) -> Result<T, StoreError>) -> Result<T, StoreError> {
        self.mutate(Instant::now(), f)
    }

    /// Cascading delete of a node. The removed subtree is handed to the
    /// backend's recovery record before it is gone.
    pub fn remove_node(&mut self, now: Instant, kind: ForestKind, id: &str) -> Result<usize, StoreError> {
        let removed_json = match kind {
            ForestKind::Threads => self.store.threads.subtree(id).map(|r| serde_json::to_string_pretty(&r)),
            ForestKind::Pantry => self.store.pantry.subtree(id).map(|r| serde_json::to_string_pretty(&r)),
        };
        let removed = self.mutate(now, |store| match kind {
            ForestKind::Threads => store.threads.remove(id),
            ForestKind::Pantry => store.pantry.remove(id),
        })?;
        if let Some(Ok(body)) = removed_json {
            self.backend.record(
                RecoveryEntry::new(RecoveryCategory::Delete, format!("{} node {} removed", kind, id))
                    .field("Nodes", removed)
                    .body(body),
            );
        }
        Ok(removed)
    }

    fn write(&mut self) {
        let snapshot = self.store.to_snapshot();
        match self.backend.save(&snapshot) {
            Ok(()) => self.last_persist_error = None,
            Err(e) => self.note_error(e),
        }
    }

    /// Send the pending write now, if there is one.
    pub fn flush(&mut self) -> bool {
        if self.queue.take() {
            self.write();
            true
        } else {
            false
        }
    }

    /// One turn of the event loop: apply the newest remote document, then
    /// send the pending write if its quiet window has passed.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let mut outcome = TickOutcome::default();
        if let Some(remote) = self.backend.poll_remote() {
            outcome.replaced = self.replace(remote);
        }
        if self.queue.take_due(now) {
            self.write();
            outcome.saved = true;
        }
        outcome
    }

    /// Last-writer-wins replacement by a remote document. A missing remote
    /// document leaves the local model alone. A pending local write is
    /// cancelled; its content goes to the recovery record.
    pub fn replace(&mut self, remote: Option<Snapshot>) -> bool {
        let Some(snapshot) = remote else {
            return false;
        };
        if self.queue.take() {
            let entry = RecoveryEntry::new(RecoveryCategory::Conflict, "pending local changes replaced by remote document");
            let entry = match self.store.to_snapshot().to_json() {
                Ok(body) => entry.body(body),
                Err(e) => entry.field("Error", e),
            };
            self.backend.record(entry);
        }
        self.store = Store::from_snapshot(snapshot);
        true
    }

    // -----------------------------------------------------------------------
    // Reviews
    // -----------------------------------------------------------------------

    pub fn review(&self, kind: ForestKind) -> &Review {
        match kind {
            ForestKind::Threads => &self.thread_review,
            ForestKind::Pantry => &self.pantry_review,
        }
    }

    fn apply_resume(&mut self, kind: ForestKind, update: ResumeUpdate) {
        let result = match update {
            ResumeUpdate::Save(point) => self.backend.save_resume(kind, Some(&point)),
            ResumeUpdate::Clear => self.backend.save_resume(kind, None),
            ResumeUpdate::Unchanged => Ok(()),
        };
        if let Err(e) = result {
            self.note_error(e);
        }
    }

    pub fn review_start(&mut self, kind: ForestKind) -> ReviewPhase {
        let update = match kind {
            ForestKind::Threads => self.thread_review.start(&mut self.store.threads),
            ForestKind::Pantry => self.pantry_review.start(&mut self.store.pantry),
        };
        self.apply_resume(kind, update);
        self.review(kind).phase()
    }

    pub fn review_next(&mut self, kind: ForestKind) -> ReviewPhase {
        let update = match kind {
            ForestKind::Threads => self.thread_review.advance(),
            ForestKind::Pantry => self.pantry_review.advance(),
        };
        self.apply_resume(kind, update);
        self.review(kind).phase()
    }

    pub fn review_prev(&mut self, kind: ForestKind) -> ReviewPhase {
        let update = match kind {
            ForestKind::Threads => self.thread_review.retreat(),
            ForestKind::Pantry => self.pantry_review.retreat(),
        };
        self.apply_resume(kind, update);
        self.review(kind).phase()
    }

    pub fn review_stop(&mut self, kind: ForestKind) {
        let update = match kind {
            ForestKind::Threads => self.thread_review.stop(),
            ForestKind::Pantry => self.pantry_review.stop(),
        };
        self.apply_resume(kind, update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::backend::{FileBackend, MemoryBackend};
    use crate::ops::pantry_ops::add_category;
    use crate::ops::thread_ops::add_thread;
    use tempfile::TempDir;

    const WINDOW: Duration = Duration::from_millis(250);

    fn names(session: &Session<impl Backend>) -> Vec<String> {
        session.store().threads.iter().map(|n| n.name().to_string()).collect()
    }

    #[test]
    fn local_backend_writes_every_mutation() {
        let mut session = Session::open(MemoryBackend::local(None), WINDOW);
        session.mutate_now(|s| add_thread(s, None, "Reading")).unwrap();
        assert!(!session.has_pending_write());
        let stored = session.backend_mut().load();
        assert_eq!(stored.threads[0].name, "Reading");
    }

    #[test]
    fn failed_mutation_persists_nothing() {
        let (backend, handle) = MemoryBackend::remote(None);
        let mut session = Session::open(backend, WINDOW);
        session.subscribe().unwrap();
        let err = session.mutate_now(|s| add_thread(s, Some("N-404"), "Orphan"));
        assert_eq!(err, Err(StoreError::NotFound("N-404".into())));
        assert!(!session.has_pending_write());
        assert!(!session.flush());
        assert_eq!(handle.saves(), 0);
    }

    #[test]
    fn debounce_coalesces_and_flush_bypasses() {
        let (backend, handle) = MemoryBackend::remote(None);
        let mut session = Session::open(backend, WINDOW);
        session.subscribe().unwrap();
        let t0 = Instant::now();

        for (i, name) in ["A", "B", "C"].iter().enumerate() {
            session
                .mutate(t0 + Duration::from_millis(100 * i as u64), |s| add_thread(s, None, name))
                .unwrap();
        }
        assert_eq!(session.tick(t0 + Duration::from_millis(300)), TickOutcome::default());
        assert_eq!(handle.saves(), 0);

        let outcome = session.tick(t0 + Duration::from_millis(450));
        assert!(outcome.saved);
        assert_eq!(handle.saves(), 1);
        assert_eq!(handle.stored().unwrap().threads.len(), 3);

        session.mutate(t0, |s| add_thread(s, None, "D")).unwrap();
        assert!(session.flush());
        assert_eq!(handle.saves(), 2);
        assert!(!session.tick(t0 + Duration::from_secs(10)).saved);
    }

    #[test]
    fn remote_document_wins_and_cancels_pending_write() {
        let (backend, handle) = MemoryBackend::remote(None);
        let mut session = Session::open(backend, WINDOW);
        session.subscribe().unwrap();
        let t0 = Instant::now();
        session.mutate(t0, |s| add_thread(s, None, "Local")).unwrap();

        let remote = Snapshot::from_json(r#"{"threads":[{"id":"N-100","name":"Remote"}]}"#).unwrap();
        handle.push(Some(remote));
        let outcome = session.tick(t0 + Duration::from_millis(10));
        assert!(outcome.replaced);
        assert!(!outcome.saved);
        assert_eq!(names(&session), vec!["Remote"]);

        // The cancelled write never goes out.
        assert!(!session.tick(t0 + Duration::from_secs(5)).saved);
        assert_eq!(handle.saves(), 0);

        let recovered = session.backend().recovered();
        assert_eq!(recovered.len(), 1);
        assert_eq!(recovered[0].category, RecoveryCategory::Conflict);
        assert!(recovered[0].body.contains("Local"));
    }

    #[test]
    fn missing_remote_document_keeps_local_model() {
        let (backend, handle) = MemoryBackend::remote(None);
        let mut session = Session::open(backend, WINDOW);
        session.subscribe().unwrap();
        session.mutate_now(|s| add_thread(s, None, "Local")).unwrap();
        handle.push(None);
        assert!(!session.tick(Instant::now()).replaced);
        assert_eq!(names(&session), vec!["Local"]);
        assert!(session.has_pending_write());
    }

    #[test]
    fn remote_replacement_is_normalized() {
        let (backend, handle) = MemoryBackend::remote(None);
        let mut session = Session::open(backend, WINDOW);
        session.subscribe().unwrap();
        handle.push(Some(
            Snapshot::from_json(r#"{"threads":[{"name":"Legacy","tasks":[{"text":"t","priority":42}]}]}"#).unwrap(),
        ));
        session.tick(Instant::now());
        let root = session.store().threads.root_nodes().next().unwrap();
        assert!(root.color().is_some());
        assert!(!root.id().is_empty());
        assert_eq!(root.content.tasks[0].priority, 5);
    }

    #[test]
    fn persist_failure_is_kept_not_thrown() {
        let mut session = Session::open(MemoryBackend::local(None), WINDOW);
        let handle_less = session.backend().handle();
        assert!(handle_less.is_none());

        let (backend, handle) = MemoryBackend::remote(None);
        let mut remote = Session::open(backend, WINDOW);
        handle.set_failing(true);
        remote.mutate_now(|s| add_thread(s, None, "A")).unwrap();
        assert!(remote.flush());
        assert!(remote.last_persist_error().is_some());
        assert_eq!(names(&remote), vec!["A"]);

        handle.set_failing(false);
        remote.mutate_now(|s| add_thread(s, None, "B")).unwrap();
        remote.flush();
        assert!(remote.last_persist_error().is_none());

        session.mutate_now(|s| add_thread(s, None, "ok")).unwrap();
        assert!(session.last_persist_error().is_none());
    }

    #[test]
    fn remove_node_records_subtree() {
        let mut session = Session::open(MemoryBackend::local(None), WINDOW);
        let fit = session.mutate_now(|s| add_thread(s, None, "Fitness")).unwrap();
        session.mutate_now(|s| add_thread(s, Some(&fit), "Cardio")).unwrap();

        let removed = session.remove_node(Instant::now(), ForestKind::Threads, &fit).unwrap();
        assert_eq!(removed, 2);
        assert!(session.store().threads.is_empty());
        let entry = &session.backend().recovered()[0];
        assert_eq!(entry.category, RecoveryCategory::Delete);
        assert!(entry.body.contains("Cardio"));

        assert_eq!(
            session.remove_node(Instant::now(), ForestKind::Threads, &fit),
            Err(StoreError::NotFound(fit.clone()))
        );
    }

    #[test]
    fn review_resumes_across_sessions() {
        let tmp = TempDir::new().unwrap();
        let mut first = Session::open(FileBackend::new(tmp.path()), WINDOW);
        for name in ["A", "B", "C"] {
            first.mutate_now(|s| add_thread(s, None, name)).unwrap();
        }
        first.mutate_now(|s| add_category(s, None, "Fridge")).unwrap();
        assert_eq!(first.review_start(ForestKind::Threads), ReviewPhase::InProgress);
        first.review_next(ForestKind::Threads);
        let b = first.review(ForestKind::Threads).current_id().unwrap().to_string();
        drop(first);

        let mut second = Session::open(FileBackend::new(tmp.path()), WINDOW);
        assert_eq!(second.review(ForestKind::Threads).current_id(), Some(b.as_str()));
        assert_eq!(second.review(ForestKind::Pantry).phase(), ReviewPhase::Idle);

        second.remove_node(Instant::now(), ForestKind::Threads, &b).unwrap();
        drop(second);

        let mut third = Session::open(FileBackend::new(tmp.path()), WINDOW);
        let review = third.review(ForestKind::Threads);
        assert_eq!(review.ordered_ids().len(), 2);
        assert_eq!(review.cursor(), 1);
        assert_eq!(third.review_next(ForestKind::Threads), ReviewPhase::Complete);
        drop(third);

        let fourth = Session::open(FileBackend::new(tmp.path()), WINDOW);
        assert_eq!(fourth.review(ForestKind::Threads).phase(), ReviewPhase::Idle);
    }

    #[test]
    fn read_only_open_leaves_resume_point_alone() {
        let tmp = TempDir::new().unwrap();
        let mut first = Session::open(FileBackend::new(tmp.path()), WINDOW);
        for name in ["A", "B", "C"] {
            first.mutate_now(|s| add_thread(s, None, name)).unwrap();
        }
        first.review_start(ForestKind::Threads);
        first.review_next(ForestKind::Threads);
        let b = first.review(ForestKind::Threads).current_id().unwrap().to_string();
        first.remove_node(Instant::now(), ForestKind::Threads, &b).unwrap();
        drop(first);

        let state = crate::io::state::review_state_path(tmp.path());
        let before = std::fs::read(&state).unwrap();

        let reader = Session::open_read_only(FileBackend::new(tmp.path()), WINDOW);
        let review = reader.review(ForestKind::Threads);
        assert_eq!(review.phase(), ReviewPhase::InProgress);
        assert_eq!(review.ordered_ids().len(), 2);
        drop(reader);
        assert_eq!(std::fs::read(&state).unwrap(), before);

        // A writing open repairs the stale point
        drop(Session::open(FileBackend::new(tmp.path()), WINDOW));
        assert_ne!(std::fs::read(&state).unwrap(), before);
    }

    #[test]
    fn empty_review_set_is_a_state() {
        let mut session = Session::open(MemoryBackend::local(None), WINDOW);
        assert_eq!(session.review_start(ForestKind::Pantry), ReviewPhase::Empty);
        assert!(session.backend_mut().load_resume(ForestKind::Pantry).is_none());
    }
}
