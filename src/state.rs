//! Process-wide application state shared across the HTTP and WebSocket
//! endpoints (spec §5 "shared resources").

use std::sync::Arc;
use std::time::Duration;

use strand_core::{WrapperRegistry, view_list_factory};
use strand_scripting::{DynHost, ScriptingHost, install_contact_domain};
use strand_viewdefs::{HotLoader, ViewdefStore};

use crate::session::{ConnectionIdAllocator, SessionHandle, SessionManager, spawn_session};

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub connection_ids: Arc<ConnectionIdAllocator>,
    pub resolver: Arc<dyn ScriptingHost>,
    pub wrapper_registry: WrapperRegistry,
    pub viewdefs: ViewdefStore,
}

impl AppState {
    pub fn new(session_timeout: Duration, viewdefs: ViewdefStore) -> Self {
        let wrapper_registry = WrapperRegistry::new();
        wrapper_registry.register("ViewList", view_list_factory());

        let host = DynHost::new();
        install_contact_domain(&host);
        let resolver: Arc<dyn ScriptingHost> = Arc::new(host);

        AppState {
            sessions: SessionManager::new(session_timeout),
            connection_ids: Arc::new(ConnectionIdAllocator::default()),
            resolver,
            wrapper_registry,
            viewdefs,
        }
    }

    /// Spawns a fresh session's executor and registers it, returning the
    /// handle callers address by `internal_id` (URLs, WebSocket binding).
    pub fn create_session(&self) -> Arc<SessionHandle> {
        let task_tx = spawn_session(
            self.resolver.clone(),
            self.wrapper_registry.clone(),
            self.viewdefs.clone(),
        );
        self.sessions.register(task_tx)
    }

    /// Wires a `HotLoader` that pushes fresh HTML to every live session on
    /// file change (spec §4.11, §8 scenario 6). Each session decides for
    /// itself whether it had previously delivered this `(type, namespace)`
    /// pair — sessions that never asked for it get a no-op `SessionTask`.
    pub fn spawn_viewdef_hotloader(
        &self,
        dir: std::path::PathBuf,
    ) -> Result<HotLoader, strand_viewdefs::ViewdefError> {
        let store = self.viewdefs.clone();
        let sessions = self.sessions.clone();
        HotLoader::spawn(store, dir, move |type_name: String, namespace: String| {
            tracing::info!(%type_name, %namespace, "viewdef hot-reloaded");
            for handle in sessions.all_handles() {
                let _ = handle.task_tx.send(crate::session::SessionTask::ViewdefReloaded {
                    type_name: type_name.clone(),
                    namespace: namespace.clone(),
                });
            }
        })
    }
}
