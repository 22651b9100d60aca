use {
    anyhow::{Context, Result},
    notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher},
    std::{
        collections::BTreeSet,
        path::{Path, PathBuf},
        time::Duration,
    },
    tokio::sync::mpsc,
};

/// Watches a source tree recursively and reports changed paths. Watching
/// stops when this is dropped.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
}

impl ChangeWatcher {
    pub fn new(path: &Path, changes: mpsc::UnboundedSender<PathBuf>) -> Result<Self> {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for path in changed_paths(&event) {
                    // The receiver is gone during shutdown only.
                    let _ = changes.send(path);
                }
            }
            Err(err) => tracing::warn!(?err, "file watcher error"),
        })
        .context("failed to create file watcher")?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", path.display()))?;

        tracing::info!(path = %path.display(), "watching contract sources");
        Ok(Self { _watcher: watcher })
    }
}

/// Paths created, modified or removed by the event. Access events do not
/// change sources.
fn changed_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event.paths.clone(),
        _ => Vec::new(),
    }
}

/// Waits for a change and collects further changes until none arrived for
/// `window`. Returns the distinct changed paths, `None` once the watcher is
/// gone.
pub async fn next_batch(
    changes: &mut mpsc::UnboundedReceiver<PathBuf>,
    window: Duration,
) -> Option<Vec<PathBuf>> {
    let mut batch = BTreeSet::from([changes.recv().await?]);
    loop {
        match tokio::time::timeout(window, changes.recv()).await {
            Ok(Some(path)) => {
                batch.insert(path);
            }
            Ok(None) | Err(_) => break,
        }
    }
    Some(batch.into_iter().collect())
}
