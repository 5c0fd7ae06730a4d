//! `Variable`: one node in a session's reactive graph (spec §3).

use std::collections::BTreeMap;
use std::time::Duration;

use crate::path::Path;
use crate::resolver::ResolvedValue;
use crate::wrapper::Wrapper;

/// Thin validating wrapper around the raw `i64` id. The sign itself carries
/// invariant 2 (frontend-vended/root ids are positive, server-vended
/// non-root ids are negative), so this type exists to make that convention
/// impossible to violate by accident at construction sites, not to hide the
/// underlying representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId(i64);

impl VariableId {
    pub const ROOT: VariableId = VariableId(1);

    /// Frontend-vended or root id. Must be positive.
    pub fn frontend(id: i64) -> Option<VariableId> {
        (id > 0).then_some(VariableId(id))
    }

    /// Server-vended non-root id. Must be negative.
    pub fn server(id: i64) -> Option<VariableId> {
        (id < 0).then_some(VariableId(id))
    }

    pub fn get(self) -> i64 {
        self.0
    }

    pub fn is_frontend_vended(self) -> bool {
        self.0 > 0
    }
}

impl std::fmt::Display for VariableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Diagnostics accumulated on a variable when `DiagLevel > 0` (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct VariableDiagnostics {
    pub compute_time: Duration,
    pub max_compute_time: Duration,
    pub change_count: u64,
    pub diags: Vec<String>,
}

#[derive(Debug)]
pub struct Variable {
    pub id: VariableId,
    pub parent_id: i64,
    pub path: Option<Path>,
    pub properties: BTreeMap<String, String>,
    pub value: ResolvedValue,
    pub value_json: serde_json::Value,
    pub wrapper_instance: Option<Box<dyn Wrapper>>,
    pub wrapper_json: Option<serde_json::Value>,
    /// Needs computation: set by watcher ref-counting in `ChangeTracker`
    /// (spec invariant 5 — a watcher directly, or a live descendant that
    /// requires this variable kept resolvable).
    pub active: bool,
    pub watcher_count: u32,
    pub descendant_active_count: u32,
    pub child_ids: Vec<i64>,
    pub diagnostics: VariableDiagnostics,
    pub error: Option<String>,
    pub unbound: bool,
}

impl Variable {
    pub fn new(id: VariableId, parent_id: i64, path: Option<Path>) -> Self {
        Variable {
            id,
            parent_id,
            path,
            properties: BTreeMap::new(),
            value: ResolvedValue::Null,
            value_json: serde_json::Value::Null,
            wrapper_instance: None,
            wrapper_json: None,
            active: false,
            watcher_count: 0,
            descendant_active_count: 0,
            child_ids: Vec::new(),
            diagnostics: VariableDiagnostics::default(),
            error: None,
            unbound: false,
        }
    }

    /// The wire value of a variable per invariant 4.
    pub fn wire_value(&self) -> &serde_json::Value {
        self.wrapper_json.as_ref().unwrap_or(&self.value_json)
    }

    pub fn type_name(&self) -> Option<&str> {
        self.properties.get("type").map(String::as_str)
    }
}
