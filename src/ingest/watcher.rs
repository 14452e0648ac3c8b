//! Source directory watcher.
//!
//! Raw `notify` events are translated into [`ChangeEvent`]s on notify's own
//! thread, where the existence checks some kinds need may block. The async
//! loop collapses each burst to one event per path and hands every event
//! to [`Folio::dispatch`] on its own task.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::core::Folio;
use crate::domain::{ChangeEvent, ChangeKind};

type Batch = notify::Result<Vec<ChangeEvent>>;

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("Watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watcher task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Watches a folio's posts directory
pub struct PostWatcher {
    folio: Folio,
}

impl PostWatcher {
    /// Create a watcher feeding the given folio
    pub fn new(folio: Folio) -> Self {
        Self { folio }
    }

    /// Directory being watched
    pub fn dir(&self) -> &Path {
        &self.folio.settings().posts_dir
    }

    /// Start watching. Runs until the returned handle is stopped.
    pub fn watch(self) -> Result<WatchHandle, WatcherError> {
        let dir = self.dir().to_path_buf();
        if !dir.is_dir() {
            return Err(WatcherError::DirectoryNotFound(dir));
        }

        let (batch_tx, batch_rx) = mpsc::unbounded_channel::<Batch>();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver only goes away on shutdown.
            let _ = batch_tx.send(res.map(|event| translate(&event)));
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!("Watching {} for changes", dir.display());

        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let task = tokio::spawn(run_watcher(self.folio, watcher, batch_rx, stop_rx));

        Ok(WatchHandle { stop_tx, task })
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher and wait for its loop to exit
    pub async fn stop(self) -> Result<(), WatcherError> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

/// Internal watcher loop
async fn run_watcher(
    folio: Folio,
    // Dropping the watcher unregisters it, so it lives as long as the loop.
    _watcher: RecommendedWatcher,
    mut batch_rx: mpsc::UnboundedReceiver<Batch>,
    mut stop_rx: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                tracing::info!("Watcher stopping...");
                break;
            }
            received = batch_rx.recv() => {
                let Some(first) = received else {
                    tracing::error!("Watcher channel disconnected");
                    break;
                };

                let mut changes = Vec::new();
                let mut next = Some(first);
                while let Some(batch) = next {
                    match batch {
                        Ok(batch) => changes.extend(batch),
                        Err(e) => tracing::warn!("Watcher error: {}", e),
                    }
                    next = batch_rx.try_recv().ok();
                }

                for change in coalesce(changes) {
                    let folio = folio.clone();
                    tokio::spawn(async move {
                        folio.dispatch(change).await;
                    });
                }
            }
        }
    }
}

/// Translate one `notify` event into change events.
///
/// Touches the filesystem for kinds the backend cannot classify, so call it
/// off the async runtime.
pub fn translate(event: &Event) -> Vec<ChangeEvent> {
    match event.kind {
        EventKind::Access(_) => Vec::new(),

        // inotify reports a rename as a From, a To and then a combined Both;
        // the per-side events already cover it.
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => Vec::new(),

        _ => event
            .paths
            .iter()
            .filter_map(|path| {
                let (kind, folder) = classify(&event.kind, path)?;
                Some(change(path, kind, folder))
            })
            .collect(),
    }
}

/// Collapse a burst of changes to one per path.
///
/// The last kind seen for a path wins: the dispatcher reads the file's
/// current state anyway, so only the final create-or-remove direction
/// matters. Paths keep the order of their first appearance.
pub fn coalesce(changes: Vec<ChangeEvent>) -> Vec<ChangeEvent> {
    let mut slots: HashMap<PathBuf, usize> = HashMap::new();
    let mut collapsed: Vec<ChangeEvent> = Vec::with_capacity(changes.len());

    for change in changes {
        match slots.get(&change.path) {
            Some(&slot) => collapsed[slot] = change,
            None => {
                slots.insert(change.path.clone(), collapsed.len());
                collapsed.push(change);
            }
        }
    }

    collapsed
}

fn classify(kind: &EventKind, path: &Path) -> Option<(ChangeKind, bool)> {
    let exists = path.exists();
    Some(match kind {
        EventKind::Create(create) => (ChangeKind::Create, *create == CreateKind::Folder),
        EventKind::Remove(remove) => (ChangeKind::Delete, *remove == RemoveKind::Folder),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => (ChangeKind::MovedFrom, false),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => (ChangeKind::MovedTo, false),
        EventKind::Modify(ModifyKind::Name(_)) if exists => (ChangeKind::MovedTo, false),
        EventKind::Modify(ModifyKind::Name(_)) => (ChangeKind::MovedFrom, false),
        EventKind::Modify(_) => (ChangeKind::Modify, false),
        EventKind::Any | EventKind::Other if exists => (ChangeKind::Modify, false),
        EventKind::Any | EventKind::Other => (ChangeKind::Delete, false),
        EventKind::Access(_) => return None,
    })
}

fn change(path: &Path, kind: ChangeKind, folder: bool) -> ChangeEvent {
    let event = ChangeEvent::new(path, kind);
    if folder || path.is_dir() {
        event.directory()
    } else {
        event
    }
}
