//! Live reload: filesystem write events on the notebook directory trigger a
//! single-file reload through the same loader the startup scan uses.

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::loader::{identifier_for, is_hidden, NotebookLoader};

/// Coalesces bursts of reload requests per identifier. A request that is
/// superseded during its quiet period is dropped, and a conversion that is
/// superseded while running is discarded instead of committed.
#[derive(Clone)]
pub struct ReloadScheduler {
    loader: Arc<NotebookLoader>,
    debounce: Duration,
    pending: Arc<Mutex<HashMap<String, u64>>>,
}

impl ReloadScheduler {
    pub fn new(loader: Arc<NotebookLoader>, debounce: Duration) -> Self {
        Self {
            loader,
            debounce,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn reload(
        loader: Arc<NotebookLoader>,
        pending: Arc<Mutex<HashMap<String, u64>>>,
        identifier: String,
        generation: u64,
        path: PathBuf,
        debounce: Duration,
    ) {
        tokio::time::sleep(debounce).await;
        if pending.lock().get(&identifier) != Some(&generation) {
            debug!("reload of {} superseded", identifier);
            return;
        }
        if !path.is_file() {
            debug!("{} is no longer a regular file, skipping reload", path.display());
            let mut pending = pending.lock();
            if pending.get(&identifier) == Some(&generation) {
                pending.remove(&identifier);
            }
            return;
        }

        info!("reloading {}", identifier);
        let Some(conversion) = loader.convert(&path).await else {
            return;
        };

        // The commit happens under the pending lock so a newer reload cannot
        // be scheduled between the generation check and the upsert.
        let mut pending = pending.lock();
        if pending.get(&identifier) != Some(&generation) {
            debug!("discarding stale conversion of {}", identifier);
            return;
        }
        let outcome = loader.commit(conversion);
        pending.remove(&identifier);
        if outcome.is_fallback() {
            warn!("{} reloaded with a conversion error", outcome.identifier());
        }
    }

    /// Queue a reload of `path`, superseding any earlier reload of the same
    /// file that has not committed yet.
    pub fn schedule(&self, path: PathBuf) -> Option<JoinHandle<()>> {
        let identifier = identifier_for(&path)?;
        let generation = {
            let mut pending = self.pending.lock();
            let generation = pending.entry(identifier.clone()).or_insert(0);
            *generation += 1;
            *generation
        };
        Some(tokio::spawn(Self::reload(
            self.loader.clone(),
            self.pending.clone(),
            identifier,
            generation,
            path,
            self.debounce,
        )))
    }
}

/// Keeps the underlying OS watcher alive; dropping it stops live reload.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl WatchHandle {
    pub fn abort(&self) {
        self.task.abort();
    }
}

fn is_write(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
    )
}

async fn event_loop(
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    scheduler: ReloadScheduler,
) {
    while let Some(res) = rx.recv().await {
        match res {
            Ok(event) if is_write(&event.kind) => {
                for path in event.paths {
                    if !is_hidden(&path) {
                        scheduler.schedule(path);
                    }
                }
            }
            Ok(event) => debug!("ignoring {:?} on {:?}", event.kind, event.paths),
            Err(e) => warn!("notebook watcher error: {}", e),
        }
    }
    warn!("notebook watcher channel closed, live reload stopped");
}

/// Watch `dir` (non-recursively) and reload notebooks as they are written.
pub fn watch(dir: &Path, scheduler: ReloadScheduler) -> notify::Result<WatchHandle> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        },
        Config::default(),
    )?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    info!("watching {} for changes", dir.display());
    let task = tokio::spawn(event_loop(rx, scheduler));
    Ok(WatchHandle {
        _watcher: watcher,
        task,
    })
}
