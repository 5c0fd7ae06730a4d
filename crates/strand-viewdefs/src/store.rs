//! `ViewdefStore`: the process-wide, read-mostly index of `(type, namespace)`
//! -> HTML template (spec §4.11).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::ViewdefError;
use crate::namespace::{parse_filename, viewdef_key};

#[derive(Clone, Default)]
pub struct ViewdefStore {
    templates: Arc<DashMap<(String, String), String>>,
    root: Arc<std::sync::RwLock<Option<PathBuf>>>,
}

impl ViewdefStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_dir(&self, dir: &Path) -> Result<usize, ViewdefError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| ViewdefError::ReadDir(dir.to_path_buf(), e))?;
        let mut loaded = 0;
        for entry in entries {
            let entry = entry.map_err(|e| ViewdefError::ReadDir(dir.to_path_buf(), e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            self.load_file(&path)?;
            loaded += 1;
        }
        *self.root.write().unwrap() = Some(dir.to_path_buf());
        Ok(loaded)
    }

    pub fn load_file(&self, path: &Path) -> Result<Option<(String, String)>, ViewdefError> {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(None);
        };
        let Some((type_name, namespace)) = parse_filename(file_name) else {
            return Ok(None);
        };
        let html = std::fs::read_to_string(path).map_err(|e| ViewdefError::ReadFile(path.to_path_buf(), e))?;
        self.templates.insert((type_name.clone(), namespace.clone()), html);
        Ok(Some((type_name, namespace)))
    }

    pub fn get(&self, type_name: &str, namespace: &str) -> Option<String> {
        self.templates
            .get(&(type_name.to_string(), namespace.to_string()))
            .map(|entry| entry.value().clone())
    }

    pub fn contains(&self, type_name: &str, namespace: &str) -> bool {
        self.templates
            .contains_key(&(type_name.to_string(), namespace.to_string()))
    }

    pub fn all_keys(&self) -> Vec<(String, String)> {
        self.templates.iter().map(|e| e.key().clone()).collect()
    }

    pub fn root_dir(&self) -> Option<PathBuf> {
        self.root.read().unwrap().clone()
    }
}

/// Per-session tracking of which `(type, namespace)` pairs have already been
/// delivered to a given session, so repeated variable creations of the same
/// type don't re-send viewdef HTML (spec §8 invariant 6).
#[derive(Default, Debug)]
pub struct DeliveryTracker {
    sent: HashSet<(String, String)>,
}

impl DeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the subset of `needed` not yet delivered, marking them sent.
    pub fn take_undelivered(
        &mut self,
        needed: impl IntoIterator<Item = (String, String)>,
    ) -> Vec<(String, String)> {
        let mut fresh = Vec::new();
        for key in needed {
            if self.sent.insert(key.clone()) {
                fresh.push(key);
            }
        }
        fresh
    }

    /// Forces every previously-delivered key to be resent, used by the hot
    /// loader's no-op-execution-per-session trigger.
    pub fn reset_for_reload(&mut self, type_name: &str, namespace: &str) {
        self.sent.remove(&(type_name.to_string(), namespace.to_string()));
    }

    pub fn was_sent(&self, type_name: &str, namespace: &str) -> bool {
        self.sent.contains(&(type_name.to_string(), namespace.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn load_dir_indexes_qualified_and_unqualified_names() {
        let tmp = tempfile::tempdir().unwrap();
        write_file(tmp.path(), "Contact.DEFAULT.html", "<div>contact</div>");
        write_file(tmp.path(), "App.html", "<div>app</div>");
        write_file(tmp.path(), "notes.txt", "ignored");

        let store = ViewdefStore::new();
        let loaded = store.load_dir(tmp.path()).unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(store.get("Contact", "DEFAULT").as_deref(), Some("<div>contact</div>"));
        assert_eq!(store.get("App", "DEFAULT").as_deref(), Some("<div>app</div>"));
        assert!(!store.contains("notes", "DEFAULT"));
        assert_eq!(store.root_dir(), Some(tmp.path().to_path_buf()));
    }

    #[test]
    fn load_file_overwrites_existing_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("Contact.DEFAULT.html");
        write_file(tmp.path(), "Contact.DEFAULT.html", "<div>v1</div>");

        let store = ViewdefStore::new();
        store.load_file(&path).unwrap();
        assert_eq!(store.get("Contact", "DEFAULT").as_deref(), Some("<div>v1</div>"));

        write_file(tmp.path(), "Contact.DEFAULT.html", "<div>v2</div>");
        store.load_file(&path).unwrap();
        assert_eq!(store.get("Contact", "DEFAULT").as_deref(), Some("<div>v2</div>"));
    }

    #[test]
    fn delivery_tracker_sends_each_key_once_until_reload() {
        let mut tracker = DeliveryTracker::new();
        let needed = vec![("Contact".to_string(), "DEFAULT".to_string())];

        let first = tracker.take_undelivered(needed.clone());
        assert_eq!(first, needed);
        assert!(tracker.was_sent("Contact", "DEFAULT"));

        let second = tracker.take_undelivered(needed.clone());
        assert!(second.is_empty());

        tracker.reset_for_reload("Contact", "DEFAULT");
        assert!(!tracker.was_sent("Contact", "DEFAULT"));

        let third = tracker.take_undelivered(needed.clone());
        assert_eq!(third, needed);
    }
}
