use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Watches one document file and forwards change notifications over a
/// channel. The notify callback thread does nothing else; the owner of the
/// receiver decides when to reload.
pub struct DocumentWatcher {
    _watcher: RecommendedWatcher,
}

impl DocumentWatcher {
    /// Watch `file` (via its parent directory, so atomic renames are seen)
    /// and send `()` on `tx` for every create, modify or remove touching it.
    pub fn start(file: &Path, tx: mpsc::Sender<()>) -> Result<Self, notify::Error> {
        let target: PathBuf = file.to_path_buf();
        let dir = file.parent().unwrap_or(Path::new(".")).to_path_buf();
        let name = file.file_name().map(|n| n.to_os_string());

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)) {
                    return;
                }
                let touches = event
                    .paths
                    .iter()
                    .any(|p| p == &target || (p.file_name().map(|n| n.to_os_string()) == name && name.is_some()));
                if touches {
                    let _ = tx.send(());
                }
            },
            Config::default(),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        Ok(DocumentWatcher { _watcher: watcher })
    }
}
