//! The per-session cooperative executor (spec §5): one `tokio` task per
//! session draining a `mpsc::UnboundedReceiver<SessionTask>`, racing its own
//! 10ms debounce timer in the same `select!` loop rather than handing that
//! job to a separate reactor thread.

pub mod backend;
pub mod batcher;
pub mod handler;
pub mod manager;

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Sleep, sleep};
use tracing::{debug, warn};

use strand_core::{ResolvedValue, WrapperRegistry};
use strand_protocol::{decode_frame, encode_messages};
use strand_scripting::ScriptingHost;
use strand_viewdefs::ViewdefStore;

pub use backend::{ConnectionId, ConnectionIdAllocator, ForeignBackend, VariableBackend, WatchResult};
pub use batcher::OutgoingBatcher;
pub use handler::ProtocolHandler;
pub use manager::{SessionHandle, SessionManager};

/// The flush debounce window (spec §4.8: "coalesces bursts of backend
/// activity into one wire message roughly every 10ms").
const DEBOUNCE: Duration = Duration::from_millis(10);

/// Work items posted onto a session's single-threaded executor. Everything
/// that touches a session's `ChangeTracker` goes through this queue, so the
/// tracker itself never needs to be `Sync`.
pub enum SessionTask {
    /// A raw WebSocket text frame (or the body of a `POST /api/*` call)
    /// received on `conn`.
    Frame { raw: String, conn: ConnectionId },
    /// A connection came online and wants flushed batches written to `tx`.
    Connect {
        conn: ConnectionId,
        tx: mpsc::UnboundedSender<String>,
    },
    /// A connection dropped; `root_id` is the variable (if any) whose
    /// descendants should be cleared so a reconnect gets a clean resync.
    Disconnect {
        conn: ConnectionId,
        root_id: Option<i64>,
    },
    /// `GET /{sessionID}/variables.json`: a full snapshot of the variable
    /// graph plus the aggregate diagnostics change count (spec §6).
    Dump {
        diag: i32,
        reply: oneshot::Sender<(u64, serde_json::Value)>,
    },
    /// A viewdef template changed on disk; resend it immediately to every
    /// connection that already has the stale copy (spec §4.11, §8 scenario
    /// 6). No-op for sessions that never saw this type.
    ViewdefReloaded { type_name: String, namespace: String },
    Shutdown,
}

struct SessionRuntime {
    handler: ProtocolHandler,
    resolver: Arc<dyn ScriptingHost>,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<String>>,
}

impl SessionRuntime {
    fn bootstrap(
        resolver: Arc<dyn ScriptingHost>,
        wrapper_registry: WrapperRegistry,
        viewdefs: ViewdefStore,
    ) -> Self {
        let backend = VariableBackend::new(wrapper_registry);
        let mut handler = ProtocolHandler::new(backend, viewdefs);

        let app = resolver.create_app_object();
        let mut root_properties = BTreeMap::new();
        root_properties.insert("type".to_string(), app.type_name());
        match handler
            .backend_mut()
            .tracker_mut()
            .create_root(ResolvedValue::Object(app), root_properties.clone())
        {
            Ok(()) => handler.deliver_viewdefs_if_needed(&root_properties, strand_protocol::Priority::High),
            Err(err) => warn!(error = %err, "failed to create session root variable"),
        }

        SessionRuntime {
            handler,
            resolver,
            connections: HashMap::new(),
        }
    }

    /// Groups the batcher's output by connection (spec §4.8, §5: each
    /// connection only ever hears about what it watches) and encodes +
    /// sends one frame per connection that has something pending.
    fn flush(&mut self) {
        let batch = self.handler.batcher_mut().take_batch();
        if batch.is_empty() {
            return;
        }
        let mut per_connection: HashMap<ConnectionId, Vec<strand_protocol::Message>> = HashMap::new();
        for (msg, recipients) in batch {
            for conn in recipients {
                per_connection.entry(conn).or_default().push(msg.clone());
            }
        }
        for (conn, messages) in per_connection {
            let Some(tx) = self.connections.get(&conn) else {
                continue;
            };
            match encode_messages(&messages) {
                Ok(encoded) => {
                    let _ = tx.send(encoded);
                }
                Err(err) => warn!(error = %err, "failed to encode outgoing batch"),
            }
        }
    }
}

/// Spawns a session's executor task and returns the sender new `SessionTask`s
/// are posted to.
pub fn spawn_session(
    resolver: Arc<dyn ScriptingHost>,
    wrapper_registry: WrapperRegistry,
    viewdefs: ViewdefStore,
) -> mpsc::UnboundedSender<SessionTask> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run(
        SessionRuntime::bootstrap(resolver, wrapper_registry, viewdefs),
        rx,
    ));
    tx
}

async fn run(mut rt: SessionRuntime, mut rx: mpsc::UnboundedReceiver<SessionTask>) {
    let mut debounce_timer: Option<Pin<Box<Sleep>>> = None;

    loop {
        tokio::select! {
            maybe_task = rx.recv() => {
                let Some(task) = maybe_task else { break };
                match task {
                    SessionTask::Frame { raw, conn } => {
                        let needs_timer = handle_frame(&mut rt, &raw, conn);
                        if needs_timer && debounce_timer.is_none() {
                            debounce_timer = Some(Box::pin(sleep(DEBOUNCE)));
                        }
                    }
                    SessionTask::Connect { conn, tx } => {
                        rt.connections.insert(conn, tx);
                    }
                    SessionTask::Disconnect { conn, root_id } => {
                        rt.connections.remove(&conn);
                        let mut destroyed = rt.handler.backend_mut().disconnect(conn);
                        if let Some(root_id) = root_id {
                            destroyed.extend(rt.handler.backend_mut().clear_descendants(root_id));
                        }
                        for (id, watchers) in destroyed {
                            rt.handler.batcher_mut().queue(
                                strand_protocol::Priority::Medium,
                                strand_protocol::Message::Destroy(strand_protocol::VarIdData {
                                    var_id: id,
                                }),
                                watchers,
                            );
                        }
                        rt.flush();
                    }
                    SessionTask::Dump { diag, reply } => {
                        rt.handler.backend_mut().tracker_mut().set_diag_level(diag);
                        let _ = reply.send(dump_variables(&rt));
                    }
                    SessionTask::ViewdefReloaded { type_name, namespace } => {
                        rt.handler.push_viewdef_reload(&type_name, &namespace);
                        rt.flush();
                    }
                    SessionTask::Shutdown => break,
                }
            }
            _ = async {
                match debounce_timer.as_mut() {
                    Some(timer) => timer.await,
                    None => std::future::pending().await,
                }
            }, if debounce_timer.is_some() => {
                rt.flush();
                debounce_timer = None;
            }
        }
    }
    debug!("session executor exiting");
}

fn dump_variables(rt: &SessionRuntime) -> (u64, serde_json::Value) {
    let tracker = rt.handler.backend().tracker();
    let mut change_count = 0u64;
    let vars: Vec<serde_json::Value> = tracker
        .all_ids()
        .into_iter()
        .filter_map(|id| tracker.get(id))
        .map(|v| {
            change_count += v.diagnostics.change_count;
            serde_json::json!({
                "id": v.id.get(),
                "parentId": v.parent_id,
                "properties": v.properties,
                "value": v.wire_value(),
                "active": v.active,
                "watcherCount": v.watcher_count,
                "error": v.error,
            })
        })
        .collect();
    (change_count, serde_json::Value::Array(vars))
}

/// Decodes and dispatches one frame; returns whether the debounce timer
/// needs to be (re)armed afterwards.
fn handle_frame(rt: &mut SessionRuntime, raw: &str, conn: ConnectionId) -> bool {
    let decoded = match decode_frame(raw) {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(error = %err, "dropping malformed frame");
            rt.handler.batcher_mut().queue(
                strand_protocol::Priority::High,
                strand_protocol::Message::error(None, "bad-message", err.to_string()),
                std::iter::once(conn).collect(),
            );
            rt.flush();
            return false;
        }
    };

    let resolver: &dyn strand_core::Resolver = rt.resolver.as_ref();
    for msg in decoded.messages {
        rt.handler.handle_message(msg, conn, resolver);
    }
    rt.handler.detect_and_queue_changes(resolver);

    if decoded.user_event {
        // User-initiated input flushes immediately rather than waiting out
        // the debounce window (spec §4.8, §8 "user-event immediate flush").
        rt.flush();
        false
    } else {
        !rt.handler.batcher_mut().is_empty() && rt.handler.batcher_mut().ensure_debounce_started()
    }
}
