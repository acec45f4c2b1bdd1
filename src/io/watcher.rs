use std::path::{Path, PathBuf};
use std::sync::mpsc;

use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Notification that the backing task file changed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadEvent {
    pub path: PathBuf,
}

/// Watches the project directory for writes to the task file.
pub struct TaskWatcher {
    _watcher: RecommendedWatcher,
    rx: mpsc::Receiver<ReloadEvent>,
}

impl TaskWatcher {
    /// Start watching `file_name` inside `deck_dir`.
    /// `poll()` should be called each tick of the event loop.
    pub fn start(deck_dir: &Path, file_name: &str) -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel();
        let target = file_name.to_string();

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| {
                let Ok(event) = result else {
                    return;
                };
                match event.kind {
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {}
                    _ => return,
                }
                // Atomic writes land as a rename of a temp file onto the target,
                // so match on the final file name only.
                if let Some(path) = event
                    .paths
                    .into_iter()
                    .find(|p| p.file_name().and_then(|n| n.to_str()) == Some(target.as_str()))
                {
                    let _ = tx.send(ReloadEvent { path });
                }
            },
            Config::default(),
        )?;

        watcher.watch(deck_dir, RecursiveMode::NonRecursive)?;
        Ok(TaskWatcher {
            _watcher: watcher,
            rx,
        })
    }

    /// Non-blocking. Collapses any burst of queued events into one.
    pub fn poll(&self) -> Option<ReloadEvent> {
        let mut last = None;
        while let Ok(evt) = self.rx.try_recv() {
            last = Some(evt);
        }
        last
    }
}
