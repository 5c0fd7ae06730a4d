//! Filesystem watcher that reloads edited viewdefs into the `ViewdefStore`
//! and notifies every live session so it re-delivers them (spec §4.11).

use std::path::PathBuf;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::ViewdefError;
use crate::store::ViewdefStore;

/// Owns the `notify` watcher and its background thread. Dropping this value
/// stops the watch.
pub struct HotLoader {
    _watcher: RecommendedWatcher,
}

impl HotLoader {
    /// Watches `dir` for changes; on every modified/created `.html` file,
    /// reloads it into `store` and invokes `on_reload(type, namespace)` so
    /// the caller can trigger the "no-op execution in every live session"
    /// that spec §4.11 describes.
    pub fn spawn(
        store: ViewdefStore,
        dir: PathBuf,
        mut on_reload: impl FnMut(String, String) + Send + 'static,
    ) -> Result<HotLoader, ViewdefError> {
        let (tx, rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        std::thread::spawn(move || {
            for res in rx {
                match res {
                    Ok(event) => {
                        if !matches!(
                            event.kind,
                            notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                        ) {
                            continue;
                        }
                        for path in event.paths {
                            match store.load_file(&path) {
                                Ok(Some((type_name, namespace))) => {
                                    log::info!(
                                        "hot-reloaded viewdef {type_name}.{namespace} from {}",
                                        path.display()
                                    );
                                    on_reload(type_name, namespace);
                                }
                                Ok(None) => {}
                                Err(err) => {
                                    log::warn!("viewdef hot-reload failed for {path:?}: {err}")
                                }
                            }
                        }
                    }
                    Err(err) => log::warn!("viewdef filesystem watch error: {err}"),
                }
            }
            log::debug!("viewdef hot-reload watcher thread exiting");
        });

        Ok(HotLoader { _watcher: watcher })
    }
}
