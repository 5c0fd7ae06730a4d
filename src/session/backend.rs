//! `VariableBackend`: the `ChangeTracker` plus per-connection watcher and
//! lifetime bookkeeping the tracker itself doesn't know about (spec §4.5).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use strand_core::{ChangeTracker, CoreError, Resolver, WrapperRegistry};

/// Identifies one live WebSocket (or `POST /api/*`) connection within a
/// session. A session normally has exactly one connection, but nothing in
/// this layer assumes that — the watcher bookkeeping is keyed on it so a
/// dropped connection can be unwound precisely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Sentinel standing in for "the implicit watch a variable takes out on
    /// itself when created without `nowatch`" — not tied to any real
    /// connection. Real connections are allocated starting at 1.
    pub const IMPLICIT: ConnectionId = ConnectionId(0);

    #[cfg(test)]
    pub fn for_test(id: u64) -> Self {
        ConnectionId(id)
    }
}

pub struct ConnectionIdAllocator {
    next: AtomicU64,
}

impl Default for ConnectionIdAllocator {
    fn default() -> Self {
        ConnectionIdAllocator {
            next: AtomicU64::new(1),
        }
    }
}

impl ConnectionIdAllocator {
    pub fn next(&self) -> ConnectionId {
        ConnectionId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// Consulted by `VariableBackend::watch` to decide whether a variable is
/// bound to an external backend and therefore needs its watch forwarded
/// there. No concrete implementation ships in this repo (spec Non-goals:
/// "no external-backend relay socket") — this is the seam a real deployment
/// would wire a relay connection into.
pub trait ForeignBackend: Send + Sync {
    fn is_foreign(&self, var_id: i64) -> bool;
}

pub struct WatchResult {
    pub should_forward: bool,
}

/// Owns one session's `ChangeTracker`. Adds the two things the tracker is
/// deliberately ignorant of: which connection watches which variable (the
/// tracker only keeps an anonymous count), and which variables a connection
/// is responsible for tearing down when it drops.
pub struct VariableBackend {
    tracker: ChangeTracker,
    foreign: Option<Arc<dyn ForeignBackend>>,
    watchers: HashMap<i64, HashSet<ConnectionId>>,
    tracked: HashMap<i64, HashSet<ConnectionId>>,
    /// Manual `properties["inactive"]` overrides (spec §4.7), layered on top
    /// of the tracker's own derived `active` flag rather than replacing it —
    /// `ChangeTracker::active` stays a pure function of watcher/descendant
    /// counts. `true` means forced inactive.
    active_override: HashMap<i64, bool>,
}

impl VariableBackend {
    pub fn new(wrapper_registry: WrapperRegistry) -> Self {
        VariableBackend {
            tracker: ChangeTracker::new(wrapper_registry),
            foreign: None,
            watchers: HashMap::new(),
            tracked: HashMap::new(),
            active_override: HashMap::new(),
        }
    }

    pub fn with_foreign_backend(mut self, foreign: Arc<dyn ForeignBackend>) -> Self {
        self.foreign = Some(foreign);
        self
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ChangeTracker {
        &mut self.tracker
    }

    /// `Watch(varID, conn) -> WatchResult` (spec §4.5). The variable
    /// transitions to active on its first watcher; later watchers from other
    /// connections are no-ops on the tracker side.
    pub fn watch(&mut self, var_id: i64, conn: ConnectionId) -> Result<WatchResult, CoreError> {
        if !self.tracker.exists(var_id) {
            return Err(CoreError::NotFound(var_id));
        }
        let set = self.watchers.entry(var_id).or_default();
        let was_empty = set.is_empty();
        set.insert(conn);
        if was_empty {
            self.tracker.watch(var_id)?;
            // A variable's first watcher hasn't seen its current state yet,
            // so force one full resend even if nothing has changed since
            // creation (spec §8 scenario 1: watching the root gets back its
            // type and viewdefs on the very next detection pass).
            self.tracker.change_all(var_id);
        }
        let should_forward = self
            .foreign
            .as_ref()
            .map(|f| f.is_foreign(var_id))
            .unwrap_or(false);
        Ok(WatchResult { should_forward })
    }

    /// `Unwatch(varID, conn)`. The last watcher leaving suspends path
    /// recomputation for the variable (spec §4.5, §4.2 invariant 5).
    pub fn unwatch(&mut self, var_id: i64, conn: ConnectionId) -> Result<(), CoreError> {
        if let Some(set) = self.watchers.get_mut(&var_id) {
            set.remove(&conn);
            if set.is_empty() {
                self.watchers.remove(&var_id);
                self.tracker.unwatch(var_id)?;
            }
        }
        Ok(())
    }

    /// Connections currently watching `var_id`, i.e. the recipients an
    /// outgoing message about it should reach (spec §5: "a watcher is a
    /// connection that has called watch … receives its updates").
    pub fn watchers_of(&self, var_id: i64) -> HashSet<ConnectionId> {
        self.watchers.get(&var_id).cloned().unwrap_or_default()
    }

    /// Whether `var_id` is forced inactive via `properties["inactive"]`
    /// (spec §4.7). Independent of the tracker's own derived `active` flag.
    pub fn is_inactive_override(&self, var_id: i64) -> bool {
        self.active_override.get(&var_id).copied().unwrap_or(false)
    }

    /// Flips the manual active override for `var_id` (spec §4.7 `update`:
    /// "if `properties['inactive']` is set, flip the active bit").
    pub fn set_inactive_override(&mut self, var_id: i64, inactive: bool) {
        if inactive {
            self.active_override.insert(var_id, true);
        } else {
            self.active_override.remove(&var_id);
        }
    }

    /// `Destroy(varID)`: cascades through the tracker, returning each
    /// destroyed id together with the connections that were watching it just
    /// before removal (spec §4.7 "look up watchers first, destroy, then fan
    /// a destroy notification to every other watcher").
    pub fn destroy(&mut self, var_id: i64) -> Vec<(i64, HashSet<ConnectionId>)> {
        self.tracker
            .destroy(var_id)
            .into_iter()
            .map(|id| {
                self.tracked.remove(&id);
                self.active_override.remove(&id);
                let watchers = self.watchers.remove(&id).unwrap_or_default();
                (id, watchers)
            })
            .collect()
    }

    /// `ClearDescendants(rootID)`: destroys every descendant of `root_id`
    /// (used on connection drop to force a clean resync on refresh). The
    /// root itself survives. Returns every destroyed id paired with its
    /// watchers just before removal so callers can both notify them and
    /// drop their own bookkeeping.
    pub fn clear_descendants(&mut self, root_id: i64) -> Vec<(i64, HashSet<ConnectionId>)> {
        let child_ids = self
            .tracker
            .get(root_id)
            .map(|v| v.child_ids.clone())
            .unwrap_or_default();
        let mut destroyed = Vec::new();
        for child_id in child_ids {
            destroyed.extend(self.destroy(child_id));
        }
        destroyed
    }

    /// `TrackVariable`: records that `conn` is responsible for `var_id`'s
    /// lifetime, so `disconnect` can destroy it once every owning connection
    /// is gone.
    pub fn track_variable(&mut self, var_id: i64, conn: ConnectionId) {
        self.tracked.entry(var_id).or_default().insert(conn);
    }

    /// `UntrackVariable`: releases `conn`'s lifetime claim without destroying
    /// the variable immediately (used when ownership is handed off, e.g. a
    /// `ViewList` item surviving a parent refresh).
    pub fn untrack_variable(&mut self, var_id: i64, conn: ConnectionId) {
        if let Some(set) = self.tracked.get_mut(&var_id) {
            set.remove(&conn);
            if set.is_empty() {
                self.tracked.remove(&var_id);
            }
        }
    }

    /// Unwinds everything a dropped connection owned: releases its watches
    /// and destroys variables it exclusively tracked. Returns each destroyed
    /// id paired with the connections that were watching it just before
    /// removal, so the caller can both notify them and drop outgoing state.
    pub fn disconnect(&mut self, conn: ConnectionId) -> Vec<(i64, HashSet<ConnectionId>)> {
        let watched: Vec<i64> = self
            .watchers
            .iter()
            .filter(|(_, set)| set.contains(&conn))
            .map(|(id, _)| *id)
            .collect();
        for var_id in watched {
            let _ = self.unwatch(var_id, conn);
        }

        let orphaned: Vec<i64> = self
            .tracked
            .iter()
            .filter_map(|(id, set)| {
                let mut remaining = set.clone();
                remaining.remove(&conn);
                remaining.is_empty().then_some(*id)
            })
            .collect();

        let mut destroyed = Vec::new();
        for var_id in orphaned {
            destroyed.extend(self.destroy(var_id));
        }
        destroyed
    }

    pub fn detect_changes(&mut self, resolver: &dyn Resolver) -> Vec<strand_core::DetectedChange> {
        self.tracker.detect_changes(resolver)
    }
}
