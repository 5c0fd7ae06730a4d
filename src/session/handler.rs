//! `ProtocolHandler`: dispatches decoded wire messages against a session's
//! `VariableBackend`, queues the resulting changes onto an `OutgoingBatcher`,
//! and delivers viewdef HTML the first time a session needs it (spec §4.7,
//! §4.11).

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use strand_core::Resolver;
use strand_protocol::{CreateData, Message, UpdateData, VarIdData, split_properties};
use strand_scripting::ScriptingHost;
use strand_viewdefs::{DeliveryTracker, ViewdefStore, resolve_namespace, viewdef_key};

use crate::error::ProtocolError;
use crate::session::backend::{ConnectionId, VariableBackend};
use crate::session::batcher::OutgoingBatcher;

pub struct ProtocolHandler {
    backend: VariableBackend,
    batcher: OutgoingBatcher,
    delivery: DeliveryTracker,
    viewdefs: ViewdefStore,
}

impl ProtocolHandler {
    pub fn new(backend: VariableBackend, viewdefs: ViewdefStore) -> Self {
        ProtocolHandler {
            backend,
            batcher: OutgoingBatcher::new(),
            delivery: DeliveryTracker::new(),
            viewdefs,
        }
    }

    pub fn backend(&self) -> &VariableBackend {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut VariableBackend {
        &mut self.backend
    }

    pub fn batcher_mut(&mut self) -> &mut OutgoingBatcher {
        &mut self.batcher
    }

    /// Dispatches one incoming message. The panic boundary is per-message
    /// (spec §7 "recover barrier"): a panicking handler is caught, reported
    /// as `Message::Error` with code `fatal`, and does not bring the rest of
    /// the session down.
    pub fn handle_message(
        &mut self,
        msg: Message,
        conn: ConnectionId,
        resolver: &dyn Resolver,
    ) {
        let result = catch_unwind(AssertUnwindSafe(|| self.dispatch(msg, conn, resolver)));
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.report_error(None, &err, conn),
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "handler panicked".to_string());
                self.report_error(None, &ProtocolError::Fatal(msg), conn);
            }
        }
    }

    fn dispatch(
        &mut self,
        msg: Message,
        conn: ConnectionId,
        resolver: &dyn Resolver,
    ) -> Result<(), ProtocolError> {
        match msg {
            Message::Create(data) => self.handle_create(data, conn, resolver),
            Message::Destroy(data) => self.handle_destroy(data),
            Message::Update(data) => self.handle_update(data, resolver),
            Message::Watch(data) => self.handle_watch(data, conn),
            Message::Unwatch(data) => self.handle_unwatch(data, conn),
            Message::Error(_) => Ok(()),
        }
    }

    fn handle_create(
        &mut self,
        data: CreateData,
        conn: ConnectionId,
        resolver: &dyn Resolver,
    ) -> Result<(), ProtocolError> {
        let properties = data.properties.unwrap_or_default();
        let path = properties.get("path").cloned();
        let (clean_properties, _priority) = split_properties(&properties);

        let id = self.backend.tracker_mut().create(
            data.parent_id,
            path.as_deref(),
            clean_properties.clone(),
            Some(data.id),
            resolver,
        )?;

        if data.nowatch != Some(true) {
            self.backend.watch(id, conn)?;
        }

        // Always `:high` (spec §4.11): a viewdef must arrive before any
        // value update that references it, regardless of what priority the
        // creating message itself carried.
        self.deliver_viewdefs_if_needed(&clean_properties, strand_protocol::Priority::High);
        Ok(())
    }

    fn handle_destroy(&mut self, data: VarIdData) -> Result<(), ProtocolError> {
        for (id, watchers) in self.backend.destroy(data.var_id) {
            self.batcher.queue(
                strand_protocol::Priority::Medium,
                Message::Destroy(VarIdData { var_id: id }),
                watchers,
            );
        }
        Ok(())
    }

    /// `Update(varID, value?, properties?)` (spec §4.7). An inactive
    /// variable drops the update silently; `properties["inactive"]` flips
    /// the manual active override before anything else is considered.
    fn handle_update(
        &mut self,
        data: UpdateData,
        resolver: &dyn Resolver,
    ) -> Result<(), ProtocolError> {
        if let Some(properties) = &data.properties
            && let Some(raw) = properties.get("inactive")
        {
            self.backend
                .set_inactive_override(data.var_id, raw != "false" && raw != "0");
        }

        if self.backend.is_inactive_override(data.var_id) {
            return Ok(());
        }

        if let Some(value) = data.value {
            let resolved = json_to_resolved(value);
            self.backend
                .tracker_mut()
                .write_through(data.var_id, resolved, resolver)?;
        }
        Ok(())
    }

    fn handle_watch(&mut self, data: VarIdData, conn: ConnectionId) -> Result<(), ProtocolError> {
        self.backend.watch(data.var_id, conn)?;
        Ok(())
    }

    fn handle_unwatch(&mut self, data: VarIdData, conn: ConnectionId) -> Result<(), ProtocolError> {
        self.backend.unwatch(data.var_id, conn)?;
        Ok(())
    }

    /// Runs `ChangeTracker::detect_changes` and queues one `Message::Update`
    /// per changed variable, tagged with whichever priority its changed
    /// properties carried (spec §4.8).
    pub fn detect_and_queue_changes(&mut self, resolver: &dyn Resolver) {
        let changes = self.backend.detect_changes(resolver);
        for change in changes {
            let (clean_properties, priority) = split_properties(&change.properties);
            let properties = (!clean_properties.is_empty()).then_some(clean_properties);
            let recipients = self.backend.watchers_of(change.id);
            self.batcher.queue(
                priority,
                Message::Update(UpdateData {
                    var_id: change.id,
                    value: change.value,
                    properties,
                }),
                recipients,
            );
        }
    }

    /// Checks whether the properties of a freshly created variable name a
    /// type this session hasn't been sent the viewdef HTML for yet, and if
    /// so queues a `viewdefs` property update on variable 1 (spec §4.11).
    /// `pub(crate)` so the session bootstrap can run the same check for the
    /// root variable, which is created directly against the tracker rather
    /// than through `handle_create` (spec §8 scenario 1).
    pub(crate) fn deliver_viewdefs_if_needed(
        &mut self,
        properties: &BTreeMap<String, String>,
        priority: strand_protocol::Priority,
    ) {
        let Some(type_name) = properties.get("type") else {
            return;
        };
        let namespace = resolve_namespace(
            properties.get("namespace").map(String::as_str),
            properties.get("fallbackNamespace").map(String::as_str),
        );
        if !self.viewdefs.contains(type_name, namespace) {
            return;
        }
        let fresh = self
            .delivery
            .take_undelivered([(type_name.clone(), namespace.to_string())]);
        if fresh.is_empty() {
            return;
        }

        let mut bundle = BTreeMap::new();
        for (t, ns) in fresh {
            if let Some(html) = self.viewdefs.get(&t, &ns) {
                bundle.insert(viewdef_key(&t, &ns), html);
            }
        }
        let Ok(encoded) = serde_json::to_string(&bundle) else {
            return;
        };
        let mut properties = BTreeMap::new();
        properties.insert("viewdefs".to_string(), encoded);
        let recipients = self.backend.watchers_of(1);
        self.batcher.queue(
            priority,
            Message::Update(UpdateData {
                var_id: 1,
                value: None,
                properties: Some(properties),
            }),
            recipients,
        );
    }

    /// Pushes fresh HTML for `type_name.namespace` to this session if (and
    /// only if) it had previously received the old version — a session that
    /// never asked for this viewdef has nothing to resync (spec §4.11, §8
    /// scenario 6 "every session that had previously received the old
    /// viewdef"). Queues a high-priority `viewdefs` update on variable 1;
    /// the caller is responsible for flushing afterwards since hot-reload
    /// bypasses the normal debounce-on-create path.
    pub fn push_viewdef_reload(&mut self, type_name: &str, namespace: &str) {
        if !self.delivery.was_sent(type_name, namespace) {
            return;
        }
        let Some(html) = self.viewdefs.get(type_name, namespace) else {
            return;
        };
        self.delivery.reset_for_reload(type_name, namespace);
        self.delivery
            .take_undelivered([(type_name.to_string(), namespace.to_string())]);

        let mut bundle = BTreeMap::new();
        bundle.insert(viewdef_key(type_name, namespace), html);
        let Ok(encoded) = serde_json::to_string(&bundle) else {
            return;
        };
        let mut properties = BTreeMap::new();
        properties.insert("viewdefs".to_string(), encoded);
        let recipients = self.backend.watchers_of(1);
        self.batcher.queue(
            strand_protocol::Priority::High,
            Message::Update(UpdateData {
                var_id: 1,
                value: None,
                properties: Some(properties),
            }),
            recipients,
        );
    }

    /// Reports a protocol-level error back to the connection whose frame
    /// caused it — other connections in the session never asked about it.
    fn report_error(&mut self, var_id: Option<i64>, err: &ProtocolError, conn: ConnectionId) {
        self.batcher.queue(
            strand_protocol::Priority::High,
            Message::error(var_id, err.code(), err.to_string()),
            std::iter::once(conn).collect(),
        );
    }
}

fn json_to_resolved(value: serde_json::Value) -> strand_core::ResolvedValue {
    match value {
        serde_json::Value::Null => strand_core::ResolvedValue::Null,
        serde_json::Value::Bool(b) => strand_core::ResolvedValue::Bool(b),
        serde_json::Value::Number(n) => strand_core::ResolvedValue::Number(n),
        serde_json::Value::String(s) => strand_core::ResolvedValue::String(s),
        serde_json::Value::Array(items) => {
            strand_core::ResolvedValue::Array(items.into_iter().map(json_to_resolved).collect())
        }
        // Objects arrive on the wire only as `{"obj": id}` references, which
        // this layer doesn't resolve back to a live handle — an inline object
        // literal update is rejected upstream of here by the scripting host.
        serde_json::Value::Object(_) => strand_core::ResolvedValue::Null,
    }
}
