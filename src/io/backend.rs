use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::io::recovery::{RecoveryCategory, RecoveryEntry, atomic_write, log_recovery};
use crate::io::state::{ReviewStateFile, read_review_state, write_review_state};
use crate::io::watcher::DocumentWatcher;
use crate::model::review::{ForestKind, ReviewResume};
use crate::model::snapshot::Snapshot;

pub const DATA_FILE: &str = "data.json";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("could not read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not serialize snapshot: {0}")]
    SerializeError(#[from] serde_json::Error),
    #[error("could not watch {path}: {source}")]
    WatchError {
        path: PathBuf,
        source: notify::Error,
    },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// The persistence collaborator of a session.
///
/// `load` never fails: nothing stored, or a document that does not parse,
/// reads as the default snapshot. `save` is best effort and its error is
/// for logging only.
pub trait Backend {
    fn load(&mut self) -> Snapshot;

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistError>;

    /// Begin receiving remote changes. Backends without change notification
    /// keep the default, which does nothing.
    fn subscribe(&mut self) -> Result<(), PersistError> {
        Ok(())
    }

    /// The newest remote document received since the last poll.
    /// `Some(None)` means the remote reported that no document exists.
    fn poll_remote(&mut self) -> Option<Option<Snapshot>> {
        None
    }

    /// Whether writes should be coalesced by the save queue rather than
    /// issued immediately
    fn debounced(&self) -> bool {
        false
    }

    fn load_resume(&mut self, kind: ForestKind) -> Option<ReviewResume>;

    fn save_resume(&mut self, kind: ForestKind, resume: Option<&ReviewResume>) -> Result<(), PersistError>;

    /// Keep data that would otherwise be lost. The default drops it.
    fn record(&mut self, entry: RecoveryEntry) {
        let _ = entry;
    }
}

// ---------------------------------------------------------------------------
// Data directory
// ---------------------------------------------------------------------------

/// `data.json` in a data directory, watched with notify, with failures
/// appended to the directory's recovery log.
pub struct FileBackend {
    dir: PathBuf,
    watcher: Option<(DocumentWatcher, Receiver<()>)>,
    /// Text of our own last write, so its change event is not mistaken for
    /// a remote edit
    last_written: Option<String>,
}

impl FileBackend {
    pub fn new(dir: &Path) -> Self {
        FileBackend {
            dir: dir.to_path_buf(),
            watcher: None,
            last_written: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    fn read_document(&self) -> Result<Option<String>, PersistError> {
        let path = self.data_path();
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(PersistError::ReadError { path, source }),
        }
    }

    fn parse_or_log(&self, text: &str) -> Option<Snapshot> {
        match Snapshot::from_json(text) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log_recovery(
                    &self.dir,
                    RecoveryEntry::new(RecoveryCategory::Parser, "data.json replaced by an empty document")
                        .field("Source", self.data_path().display())
                        .field("Error", e)
                        .body(text),
                );
                None
            }
        }
    }
}

impl Backend for FileBackend {
    fn load(&mut self) -> Snapshot {
        match self.read_document() {
            Ok(Some(text)) => self.parse_or_log(&text).unwrap_or_default(),
            Ok(None) => Snapshot::default(),
            Err(e) => {
                eprintln!("warning: {}", e);
                Snapshot::default()
            }
        }
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let text = snapshot.to_json()?;
        let path = self.data_path();
        if let Err(source) = atomic_write(&path, text.as_bytes()) {
            log_recovery(
                &self.dir,
                RecoveryEntry::new(RecoveryCategory::Write, "save failed")
                    .field("Target", path.display())
                    .field("Error", &source)
                    .body(text.as_str()),
            );
            return Err(PersistError::WriteError { path, source });
        }
        self.last_written = Some(text);
        Ok(())
    }

    fn subscribe(&mut self) -> Result<(), PersistError> {
        if self.watcher.is_some() {
            return Ok(());
        }
        let path = self.data_path();
        let (tx, rx) = mpsc::channel();
        let watcher = DocumentWatcher::start(&path, tx).map_err(|source| PersistError::WatchError { path, source })?;
        self.watcher = Some((watcher, rx));
        Ok(())
    }

    fn poll_remote(&mut self) -> Option<Option<Snapshot>> {
        let (_, rx) = self.watcher.as_ref()?;
        let mut changed = false;
        while rx.try_recv().is_ok() {
            changed = true;
        }
        if !changed {
            return None;
        }
        match self.read_document() {
            Ok(Some(text)) if self.last_written.as_deref() == Some(text.as_str()) => None,
            Ok(Some(text)) => Some(self.parse_or_log(&text)),
            Ok(None) => Some(None),
            Err(e) => {
                eprintln!("warning: {}", e);
                None
            }
        }
    }

    fn load_resume(&mut self, kind: ForestKind) -> Option<ReviewResume> {
        read_review_state(&self.dir).get(kind).cloned()
    }

    fn save_resume(&mut self, kind: ForestKind, resume: Option<&ReviewResume>) -> Result<(), PersistError> {
        let mut state = read_review_state(&self.dir);
        state.set(kind, resume.cloned());
        write_review_state(&self.dir, &state).map_err(|source| PersistError::WriteError {
            path: crate::io::state::review_state_path(&self.dir),
            source,
        })
    }

    fn record(&mut self, entry: RecoveryEntry) {
        log_recovery(&self.dir, entry);
    }
}

// ---------------------------------------------------------------------------
// In-memory document store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MemoryDocument {
    snapshot: Option<Snapshot>,
    saves: usize,
    failing: bool,
}

fn lock(doc: &Mutex<MemoryDocument>) -> MutexGuard<'_, MemoryDocument> {
    doc.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A document store held in memory. In remote mode writes are debounced
/// and other writers can push replacement documents through a
/// [`RemoteHandle`]; this is the stand-in for a remote document service.
pub struct MemoryBackend {
    doc: Arc<Mutex<MemoryDocument>>,
    remote: Option<(Sender<Option<Snapshot>>, Receiver<Option<Snapshot>>)>,
    subscribed: bool,
    resume: ReviewStateFile,
    recovered: Vec<RecoveryEntry>,
}

/// The other side of a remote [`MemoryBackend`]
#[derive(Clone)]
pub struct RemoteHandle {
    doc: Arc<Mutex<MemoryDocument>>,
    tx: Sender<Option<Snapshot>>,
}

impl MemoryBackend {
    /// An immediate-write store starting from `initial`
    pub fn local(initial: Option<Snapshot>) -> Self {
        MemoryBackend {
            doc: Arc::new(Mutex::new(MemoryDocument {
                snapshot: initial,
                ..Default::default()
            })),
            remote: None,
            subscribed: false,
            resume: ReviewStateFile::default(),
            recovered: Vec::new(),
        }
    }

    /// A debounced store plus the handle other writers use
    pub fn remote(initial: Option<Snapshot>) -> (Self, RemoteHandle) {
        let mut backend = Self::local(initial);
        let (tx, rx) = mpsc::channel();
        let handle = RemoteHandle {
            doc: Arc::clone(&backend.doc),
            tx: tx.clone(),
        };
        backend.remote = Some((tx, rx));
        (backend, handle)
    }

    pub fn handle(&self) -> Option<RemoteHandle> {
        self.remote.as_ref().map(|(tx, _)| RemoteHandle {
            doc: Arc::clone(&self.doc),
            tx: tx.clone(),
        })
    }

    /// Entries passed to [`Backend::record`], oldest first
    pub fn recovered(&self) -> &[RecoveryEntry] {
        &self.recovered
    }
}

impl RemoteHandle {
    /// Replace the stored document as another writer would, and notify
    /// subscribers.
    pub fn push(&self, snapshot: Option<Snapshot>) {
        lock(&self.doc).snapshot = snapshot.clone();
        let _ = self.tx.send(snapshot);
    }

    pub fn stored(&self) -> Option<Snapshot> {
        lock(&self.doc).snapshot.clone()
    }

    /// Number of successful saves so far
    pub fn saves(&self) -> usize {
        lock(&self.doc).saves
    }

    /// Make subsequent saves fail
    pub fn set_failing(&self, failing: bool) {
        lock(&self.doc).failing = failing;
    }
}

impl Backend for MemoryBackend {
    fn load(&mut self) -> Snapshot {
        lock(&self.doc).snapshot.clone().unwrap_or_default()
    }

    fn save(&mut self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let mut doc = lock(&self.doc);
        if doc.failing {
            drop(doc);
            self.recovered.push(
                RecoveryEntry::new(RecoveryCategory::Write, "save failed").body(snapshot.to_json()?),
            );
            return Err(PersistError::Unavailable("writes are failing".into()));
        }
        doc.snapshot = Some(snapshot.clone());
        doc.saves += 1;
        Ok(())
    }

    fn subscribe(&mut self) -> Result<(), PersistError> {
        self.subscribed = self.remote.is_some();
        Ok(())
    }

    fn poll_remote(&mut self) -> Option<Option<Snapshot>> {
        if !self.subscribed {
            return None;
        }
        let (_, rx) = self.remote.as_ref()?;
        let mut newest = None;
        loop {
            match rx.try_recv() {
                Ok(snapshot) => newest = Some(snapshot),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        newest
    }

    fn debounced(&self) -> bool {
        self.remote.is_some()
    }

    fn load_resume(&mut self, kind: ForestKind) -> Option<ReviewResume> {
        self.resume.get(kind).cloned()
    }

    fn save_resume(&mut self, kind: ForestKind, resume: Option<&ReviewResume>) -> Result<(), PersistError> {
        self.resume.set(kind, resume.cloned());
        Ok(())
    }

    fn record(&mut self, entry: RecoveryEntry) {
        self.recovered.push(entry);
    }
}
