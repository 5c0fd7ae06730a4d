//! `SessionManager`: internalID (UUID) <-> vendedID (compact string) mapping,
//! idle-session cleanup, and creation/destruction callbacks (spec §4.9).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::{Mutex, mpsc};
use tracing::info;
use uuid::Uuid;

use crate::session::SessionTask;

/// Everything the manager needs to reach a live session's cooperative
/// executor and to decide when it has gone idle.
pub struct SessionHandle {
    pub internal_id: Uuid,
    pub vended_id: String,
    pub task_tx: mpsc::UnboundedSender<SessionTask>,
    last_activity: Mutex<Instant>,
}

impl SessionHandle {
    pub async fn touch(&self) {
        *self.last_activity.lock().await = Instant::now();
    }

    async fn idle_for(&self) -> Duration {
        self.last_activity.lock().await.elapsed()
    }
}

type CreatedCallback = Box<dyn Fn(&str) + Send + Sync>;
type DestroyedCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Process-wide registry of live sessions (spec §5 "shared resources").
/// The vended-id counter resets to 1 once every session has gone, matching
/// the reference server's behavior of handing out small, readable ids.
pub struct SessionManager {
    by_vended: Arc<DashMap<String, Arc<SessionHandle>>>,
    /// Keyed on `internalID` (spec §4.9: "used in URLs and WebSocket
    /// binding") — this is how every HTTP and WebSocket route resolves a
    /// session. `by_vended` remains the source of truth for the compact
    /// backend-facing id and for iteration (idle sweep, fan-out).
    by_internal: Arc<DashMap<Uuid, Arc<SessionHandle>>>,
    next_vended: AtomicU64,
    timeout: Duration,
    on_created: std::sync::RwLock<Option<CreatedCallback>>,
    on_destroyed: std::sync::RwLock<Option<DestroyedCallback>>,
}

impl SessionManager {
    pub fn new(timeout: Duration) -> Arc<Self> {
        Arc::new(SessionManager {
            by_vended: Arc::new(DashMap::new()),
            by_internal: Arc::new(DashMap::new()),
            next_vended: AtomicU64::new(1),
            timeout,
            on_created: std::sync::RwLock::new(None),
            on_destroyed: std::sync::RwLock::new(None),
        })
    }

    pub fn set_on_session_created(&self, cb: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_created.write().unwrap() = Some(Box::new(cb));
    }

    pub fn set_on_session_destroyed(&self, cb: impl Fn(&str) + Send + Sync + 'static) {
        *self.on_destroyed.write().unwrap() = Some(Box::new(cb));
    }

    pub fn register(
        self: &Arc<Self>,
        task_tx: mpsc::UnboundedSender<SessionTask>,
    ) -> Arc<SessionHandle> {
        let vended_id = self.next_vended.fetch_add(1, Ordering::SeqCst).to_string();
        let handle = Arc::new(SessionHandle {
            internal_id: Uuid::new_v4(),
            vended_id: vended_id.clone(),
            task_tx,
            last_activity: Mutex::new(Instant::now()),
        });
        self.by_vended.insert(vended_id.clone(), handle.clone());
        self.by_internal.insert(handle.internal_id, handle.clone());
        info!(session_id = %vended_id, internal_id = %handle.internal_id, "session created");
        // Callbacks run outside any lock this registry holds — `DashMap`'s
        // internal shard locks are released before we reach here.
        if let Some(cb) = self.on_created.read().unwrap().as_ref() {
            cb(&vended_id);
        }
        handle
    }

    /// Looks a session up by its vended integer id (used internally for
    /// idle-sweep iteration and fan-out; not a routing key — see
    /// [`SessionManager::get_by_internal`]).
    pub fn get(&self, vended_id: &str) -> Option<Arc<SessionHandle>> {
        self.by_vended.get(vended_id).map(|e| e.value().clone())
    }

    /// Looks a session up by its `internalID` (spec §4.9), the id URLs and
    /// WebSocket binding key on.
    pub fn get_by_internal(&self, internal_id: &Uuid) -> Option<Arc<SessionHandle>> {
        self.by_internal.get(internal_id).map(|e| e.value().clone())
    }

    pub fn destroy(&self, vended_id: &str) {
        if let Some((_, handle)) = self.by_vended.remove(vended_id) {
            self.by_internal.remove(&handle.internal_id);
            info!(session_id = %vended_id, "session destroyed");
            if let Some(cb) = self.on_destroyed.read().unwrap().as_ref() {
                cb(vended_id);
            }
            if self.by_vended.is_empty() {
                self.next_vended.store(1, Ordering::SeqCst);
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.by_vended.len()
    }

    /// Every live session's handle, for fan-out notifications (e.g. viewdef
    /// hot-reload) that aren't addressed to one particular session.
    pub fn all_handles(&self) -> Vec<Arc<SessionHandle>> {
        self.by_vended.iter().map(|e| e.value().clone()).collect()
    }

    /// Spawns the idle-sweep loop. Runs until the process exits; there is no
    /// handle to stop it because the server owns exactly one for its whole
    /// lifetime.
    pub fn spawn_cleanup_task(self: Arc<Self>) {
        let sweep_interval = (self.timeout / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            loop {
                ticker.tick().await;
                let expired: Vec<String> = {
                    let mut expired = Vec::new();
                    for entry in self.by_vended.iter() {
                        if entry.value().idle_for().await >= self.timeout {
                            expired.push(entry.key().clone());
                        }
                    }
                    expired
                };
                for vended_id in expired {
                    if let Some(handle) = self.get(&vended_id) {
                        let _ = handle.task_tx.send(SessionTask::Shutdown);
                    }
                    self.destroy(&vended_id);
                }
            }
        });
    }
}
