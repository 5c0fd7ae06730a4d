//! `ChangeTracker`: the nervous system of a session (spec §4.2).
//!
//! Owns every `Variable` in one session, resolves paths against the
//! `Resolver` capability, and detects changes once per event-loop iteration.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Instant;

use thiserror::Error;

use crate::path::{Path, PathError, Segment};
use crate::resolver::{ResolveError, ResolvedValue, Resolver};
use crate::variable::{Variable, VariableId};
use crate::viewlist::as_view_list_item;
use crate::wrapper::{GraphHost, WrapperContext, WrapperError, WrapperRegistry};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no variable with id {0}")]
    NotFound(i64),
    #[error("no variable with id {0} to serve as parent")]
    NoParent(i64),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("variable id {0} already exists")]
    DuplicateId(i64),
    #[error("frontend-vended id must be positive, got {0}")]
    NonPositiveId(i64),
    #[error("only one root variable (parentId == 0) is permitted per session")]
    RootAlreadyExists,
}

/// One entry of the ordered list `DetectChanges` returns (spec §4.2).
#[derive(Debug, Clone)]
pub struct DetectedChange {
    pub id: i64,
    /// `None` when the only thing that changed is a property delta (e.g. a
    /// path-resolution error), matching spec §4.2's "emit a property delta"
    /// wording for the error case.
    pub value: Option<serde_json::Value>,
    pub properties: BTreeMap<String, String>,
}

pub struct ChangeTracker {
    variables: HashMap<i64, Variable>,
    next_negative_id: i64,
    wrapper_registry: WrapperRegistry,
    pending_full_resend: HashSet<i64>,
    diag_level: i32,
}

impl ChangeTracker {
    pub fn new(wrapper_registry: WrapperRegistry) -> Self {
        ChangeTracker {
            variables: HashMap::new(),
            next_negative_id: -1,
            wrapper_registry,
            pending_full_resend: HashSet::new(),
            diag_level: 0,
        }
    }

    pub fn set_diag_level(&mut self, level: i32) {
        self.diag_level = level;
    }

    pub fn diag_level(&self) -> i32 {
        self.diag_level
    }

    fn allocate_negative(&mut self) -> i64 {
        let id = self.next_negative_id;
        self.next_negative_id -= 1;
        id
    }

    /// Creates variable 1, the application root (spec §2, §3 invariant 1).
    pub fn create_root(
        &mut self,
        value: ResolvedValue,
        properties: BTreeMap<String, String>,
    ) -> Result<(), CoreError> {
        if self.variables.contains_key(&1) {
            return Err(CoreError::RootAlreadyExists);
        }
        let mut var = Variable::new(VariableId::ROOT, 0, None);
        var.properties = properties;
        var.value_json = value.to_wire_json();
        var.value = value;
        var.active = true;
        self.variables.insert(1, var);
        Ok(())
    }

    pub fn get(&self, id: i64) -> Option<&Variable> {
        self.variables.get(&id)
    }

    pub fn exists(&self, id: i64) -> bool {
        self.variables.contains_key(&id)
    }

    /// Finds an existing child of `parent_id` whose path renders identically
    /// to `path`, enforcing invariant 6 (no duplicate parent/path pairs).
    fn find_existing_child(&self, parent_id: i64, path: &str) -> Option<i64> {
        let parent = self.variables.get(&parent_id)?;
        parent.child_ids.iter().copied().find(|cid| {
            self.variables
                .get(cid)
                .and_then(|c| c.path.as_ref())
                .map(|p| p.render() == path)
                .unwrap_or(false)
        })
    }

    /// Create a variable as a child of `parent_id`, resolving `path` (if any)
    /// against the parent's current value. `explicit_id` is `Some` for
    /// frontend-vended ids, `None` to allocate a server-vended negative id.
    pub fn create(
        &mut self,
        parent_id: i64,
        path_str: Option<&str>,
        properties: BTreeMap<String, String>,
        explicit_id: Option<i64>,
        resolver: &dyn Resolver,
    ) -> Result<i64, CoreError> {
        if !self.variables.contains_key(&parent_id) {
            return Err(CoreError::NoParent(parent_id));
        }

        if explicit_id.is_none() {
            if let Some(raw) = path_str {
                if let Some(existing) = self.find_existing_child(parent_id, raw) {
                    if let Some(var) = self.variables.get_mut(&existing) {
                        var.properties.extend(properties);
                    }
                    return Ok(existing);
                }
            }
        }

        let path = path_str.map(Path::parse).transpose()?;

        let id = match explicit_id {
            Some(raw) => {
                if raw <= 0 {
                    return Err(CoreError::NonPositiveId(raw));
                }
                if self.variables.contains_key(&raw) {
                    return Err(CoreError::DuplicateId(raw));
                }
                raw
            }
            None => self.allocate_negative(),
        };

        let mut var = Variable::new(
            VariableId::frontend(id).or_else(|| VariableId::server(id)).expect("nonzero id"),
            parent_id,
            path.clone(),
        );
        var.properties = properties;

        let resolved = match &path {
            Some(p) => self.resolve(parent_id, p, resolver).unwrap_or_else(|e| {
                var.error = Some(e.to_string());
                ResolvedValue::Null
            }),
            None => ResolvedValue::Null,
        };
        var.value_json = resolved.to_wire_json();
        var.value = resolved;

        self.variables.insert(id, var);
        if let Some(parent) = self.variables.get_mut(&parent_id) {
            if !parent.child_ids.contains(&id) {
                parent.child_ids.push(id);
            }
        }

        self.apply_wrapper_refresh(id, resolver).ok();
        Ok(id)
    }

    /// Writes a new value back through a variable's path (spec §4.7 `update`).
    pub fn write_through(
        &mut self,
        id: i64,
        value: ResolvedValue,
        resolver: &dyn Resolver,
    ) -> Result<(), CoreError> {
        let (parent_id, path) = {
            let var = self.variables.get(&id).ok_or(CoreError::NotFound(id))?;
            (
                var.parent_id,
                var.path.clone().ok_or(ResolveError::NotWritable).map_err(|_| {
                    CoreError::Path(PathError::Empty)
                })?,
            )
        };
        let target = self.navigate_to_context(parent_id, &path, resolver)?;
        let last = path
            .segments
            .last()
            .expect("non-empty path validated at parse time");
        match last {
            Segment::Property(name) => {
                let obj = target.as_object().ok_or(ResolveError::NotAnObject)?;
                resolver
                    .set_property(obj, name, value)
                    .map_err(|_| CoreError::NotFound(id))?;
            }
            Segment::Method(name) => {
                let obj = target.as_object().ok_or(ResolveError::NotAnObject)?;
                resolver
                    .invoke(obj, name, std::slice::from_ref(&value))
                    .map_err(|_| CoreError::NotFound(id))?;
            }
            _ => return Err(CoreError::NotFound(id)),
        }
        Ok(())
    }

    /// Resolves every segment of `path` except the last, returning the
    /// object context the final segment should write through.
    fn navigate_to_context(
        &self,
        parent_id: i64,
        path: &Path,
        resolver: &dyn Resolver,
    ) -> Result<ResolvedValue, CoreError> {
        if path.segments.len() <= 1 {
            return self
                .variable_value(parent_id)
                .ok_or(CoreError::NoParent(parent_id));
        }
        let prefix = Path {
            segments: path.segments[..path.segments.len() - 1].to_vec(),
            params: Vec::new(),
        };
        self.resolve(parent_id, &prefix, resolver)
            .map_err(|_| CoreError::NotFound(parent_id))
    }

    fn variable_value(&self, id: i64) -> Option<ResolvedValue> {
        self.variables.get(&id).map(|v| v.value.clone())
    }

    /// Resolves `path` against the value of variable `parent_id`. `..`
    /// segments navigate the *variable* tree (spec §4.2 tie-break), so this
    /// method tracks the variable id alongside the working value.
    pub fn resolve(
        &self,
        parent_id: i64,
        path: &Path,
        resolver: &dyn Resolver,
    ) -> Result<ResolvedValue, ResolveError> {
        let mut current_var_id = parent_id;
        let mut current_value = self
            .variables
            .get(&parent_id)
            .map(|v| v.value.clone())
            .unwrap_or(ResolvedValue::Null);

        for segment in &path.segments {
            match segment {
                Segment::Standard(name) => {
                    current_value = resolver.standard_variable(name)?;
                }
                Segment::Parent => {
                    let var = self
                        .variables
                        .get(&current_var_id)
                        .ok_or(ResolveError::NoParent)?;
                    if var.parent_id == 0 && var.id.get() != 1 {
                        return Err(ResolveError::NoParent);
                    }
                    current_var_id = var.parent_id;
                    current_value = self
                        .variables
                        .get(&current_var_id)
                        .map(|v| v.value.clone())
                        .ok_or(ResolveError::NoParent)?;
                }
                Segment::Property(name) => {
                    let obj = current_value.as_object().ok_or(ResolveError::NotAnObject)?;
                    current_value = match as_view_list_item(obj) {
                        Some(item) => item.get_property(name)?,
                        None => resolver.get_property(obj, name)?,
                    };
                }
                Segment::Index(n) => {
                    current_value = match &current_value {
                        ResolvedValue::Array(items) => items
                            .get((*n - 1) as usize)
                            .cloned()
                            .ok_or(ResolveError::IndexOutOfRange(*n))?,
                        ResolvedValue::Object(obj) => resolver.get_index(obj, *n)?,
                        _ => return Err(ResolveError::NotIndexable),
                    };
                }
                Segment::Method(name) => {
                    let obj = current_value.as_object().ok_or(ResolveError::NotAnObject)?;
                    current_value = resolver.invoke(obj, name, &[])?;
                }
            }
        }
        Ok(current_value)
    }

    fn apply_wrapper_refresh(
        &mut self,
        id: i64,
        _resolver: &dyn Resolver,
    ) -> Result<(), WrapperError> {
        let (wrapper_name, properties, value) = match self.variables.get(&id) {
            Some(v) => (
                v.properties.get("wrapper").cloned(),
                v.properties.clone(),
                v.value.clone(),
            ),
            None => return Ok(()),
        };
        let Some(name) = wrapper_name else {
            return Ok(());
        };

        let mut wrapper = self
            .variables
            .get_mut(&id)
            .and_then(|v| v.wrapper_instance.take());

        if wrapper.is_none() {
            let ctx = WrapperContext {
                variable_id: id,
                properties: &properties,
            };
            match self.wrapper_registry.create(&name, &ctx) {
                Ok(w) => wrapper = Some(w),
                Err(err) => {
                    // WrapperCreateFailure (spec §7): keep raw value, leave
                    // the wrapper slot empty so the next activation retries.
                    return Err(err);
                }
            }
        }

        if let Some(mut w) = wrapper {
            w.refresh(self, &value)?;
            let wire = w.wire_json();
            if let Some(var) = self.variables.get_mut(&id) {
                var.wrapper_instance = Some(w);
                var.wrapper_json = Some(wire);
            }
        }
        Ok(())
    }

    fn note_active_transition(&mut self, id: i64, became_active: bool) {
        let parent_id = match self.variables.get(&id) {
            Some(v) => v.parent_id,
            None => return,
        };
        if parent_id == 0 {
            return;
        }
        if let Some(parent) = self.variables.get_mut(&parent_id) {
            let was_active = parent.active;
            if became_active {
                parent.descendant_active_count += 1;
            } else {
                parent.descendant_active_count =
                    parent.descendant_active_count.saturating_sub(1);
            }
            parent.active = parent.watcher_count > 0 || parent.descendant_active_count > 0;
            if was_active != parent.active {
                self.note_active_transition(parent_id, parent.active);
            }
        }
    }

    /// First watcher transitions the variable (and ancestor chain) active.
    pub fn watch(&mut self, id: i64) -> Result<(), CoreError> {
        let var = self.variables.get_mut(&id).ok_or(CoreError::NotFound(id))?;
        let was_active = var.active;
        var.watcher_count += 1;
        var.active = true;
        if !was_active {
            self.note_active_transition(id, true);
        }
        Ok(())
    }

    /// Last watcher removed suspends recomputation, unless a live descendant
    /// still needs this variable kept active (invariant 5).
    pub fn unwatch(&mut self, id: i64) -> Result<(), CoreError> {
        let var = self.variables.get_mut(&id).ok_or(CoreError::NotFound(id))?;
        let was_active = var.active;
        var.watcher_count = var.watcher_count.saturating_sub(1);
        var.active = var.watcher_count > 0 || var.descendant_active_count > 0;
        if was_active && !var.active {
            self.note_active_transition(id, false);
        }
        Ok(())
    }

    pub fn is_watched(&self, id: i64) -> bool {
        self.variables.get(&id).map(|v| v.watcher_count > 0).unwrap_or(false)
    }

    /// Marks every property of `id` changed so the next detection pass sends
    /// a full snapshot (spec §4.2 `ChangeAll`, used on fresh watches).
    pub fn change_all(&mut self, id: i64) {
        self.pending_full_resend.insert(id);
    }

    /// Destroys `id` and every descendant, depth-first so wrapper teardown
    /// hooks run on leaves before their ancestors (spec invariant 3).
    pub fn destroy(&mut self, id: i64) -> Vec<i64> {
        let mut order = Vec::new();
        self.collect_postorder(id, &mut order);

        let mut parent_of_root = None;
        if let Some(v) = self.variables.get(&id) {
            parent_of_root = Some(v.parent_id);
        }

        for victim in &order {
            if let Some(mut var) = self.variables.remove(victim) {
                if let Some(mut w) = var.wrapper_instance.take() {
                    w.destroy(self);
                }
            }
            self.pending_full_resend.remove(victim);
        }

        if let Some(parent_id) = parent_of_root {
            if let Some(parent) = self.variables.get_mut(&parent_id) {
                parent.child_ids.retain(|c| c != &id);
            }
        }
        order
    }

    fn collect_postorder(&self, id: i64, out: &mut Vec<i64>) {
        if let Some(var) = self.variables.get(&id) {
            for child in var.child_ids.clone() {
                self.collect_postorder(child, out);
            }
        }
        out.push(id);
    }

    /// Runs one detection pass: parents before children (spec §4.2 tie-break).
    pub fn detect_changes(&mut self, resolver: &dyn Resolver) -> Vec<DetectedChange> {
        let mut changes = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(1i64);
        let mut visited = HashSet::new();

        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let child_ids = match self.variables.get(&id) {
                Some(v) => v.child_ids.clone(),
                None => continue,
            };
            if let Some(change) = self.recompute_one(id, resolver) {
                changes.push(change);
            }
            for child in child_ids {
                queue.push_back(child);
            }
        }
        changes
    }

    fn recompute_one(&mut self, id: i64, resolver: &dyn Resolver) -> Option<DetectedChange> {
        let force_full = self.pending_full_resend.remove(&id);
        let (parent_id, path, active) = {
            let var = self.variables.get(&id)?;
            (var.parent_id, var.path.clone(), var.active)
        };

        if !active && !force_full {
            return None;
        }

        let Some(path) = path else {
            if force_full {
                let var = self.variables.get(&id)?;
                return Some(DetectedChange {
                    id,
                    value: Some(var.wire_value().clone()),
                    properties: var.properties.clone(),
                });
            }
            return None;
        };

        let start = Instant::now();
        let result = self.resolve(parent_id, &path, resolver);
        let elapsed = start.elapsed();

        match result {
            Ok(new_value) => {
                let changed = {
                    let var = self.variables.get(&id)?;
                    force_full || new_value != var.value || var.error.is_some()
                };
                if !changed {
                    if let Some(var) = self.variables.get_mut(&id) {
                        var.diagnostics.compute_time = elapsed;
                        var.diagnostics.max_compute_time =
                            var.diagnostics.max_compute_time.max(elapsed);
                    }
                    return None;
                }

                let had_error = self.variables.get_mut(&id).and_then(|v| v.error.take());
                let wire_json = new_value.to_wire_json();
                if let Some(var) = self.variables.get_mut(&id) {
                    var.value = new_value;
                    var.value_json = wire_json;
                    var.diagnostics.compute_time = elapsed;
                    var.diagnostics.max_compute_time = var.diagnostics.max_compute_time.max(elapsed);
                    var.diagnostics.change_count += 1;
                }

                let _ = self.apply_wrapper_refresh(id, resolver);

                let var = self.variables.get(&id)?;
                let mut properties = if force_full {
                    var.properties.clone()
                } else {
                    BTreeMap::new()
                };
                if had_error.is_some() {
                    properties.insert("error".to_string(), String::new());
                }
                Some(DetectedChange {
                    id,
                    value: Some(var.wire_value().clone()),
                    properties,
                })
            }
            Err(e) => {
                if let Some(var) = self.variables.get_mut(&id) {
                    var.error = Some(e.to_string());
                    var.diagnostics.compute_time = elapsed;
                }
                let mut properties = BTreeMap::new();
                properties.insert("error".to_string(), e.to_string());
                Some(DetectedChange {
                    id,
                    value: None,
                    properties,
                })
            }
        }
    }

    pub fn all_ids(&self) -> Vec<i64> {
        self.variables.keys().copied().collect()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }
}

impl GraphHost for ChangeTracker {
    fn create_child(
        &mut self,
        parent_id: i64,
        value: ResolvedValue,
        properties: BTreeMap<String, String>,
    ) -> i64 {
        let id = self.allocate_negative();
        let mut var = Variable::new(VariableId::server(id).expect("allocated negative"), parent_id, None);
        var.value_json = value.to_wire_json();
        var.value = value;
        var.properties = properties;
        var.active = self.variables.get(&parent_id).map(|p| p.active).unwrap_or(false);
        self.variables.insert(id, var);
        if let Some(parent) = self.variables.get_mut(&parent_id) {
            parent.child_ids.push(id);
        }
        id
    }

    fn set_child_value(&mut self, id: i64, value: ResolvedValue) {
        if let Some(var) = self.variables.get_mut(&id) {
            var.value_json = value.to_wire_json();
            var.value = value;
        }
    }

    fn destroy_child(&mut self, id: i64) {
        self.destroy(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolvedObject as _;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Debug)]
    struct FakeObject {
        id: i64,
        type_name: String,
        fields: RefCell<HashMap<String, ResolvedValue>>,
    }

    impl ResolvedObject for FakeObject {
        fn object_id(&self) -> i64 {
            self.id
        }
        fn type_name(&self) -> String {
            self.type_name.clone()
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
    }

    #[derive(Default)]
    struct FakeResolver {
        objects: HashMap<i64, std::sync::Arc<FakeObject>>,
    }

    impl Resolver for FakeResolver {
        fn get_property(
            &self,
            obj: &crate::resolver::ObjectHandle,
            name: &str,
        ) -> Result<ResolvedValue, ResolveError> {
            let fake = self
                .objects
                .get(&obj.object_id())
                .ok_or_else(|| ResolveError::NoSuchProperty(name.to_string()))?;
            fake.fields
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| ResolveError::NoSuchProperty(name.to_string()))
        }

        fn get_index(
            &self,
            _obj: &crate::resolver::ObjectHandle,
            index: u64,
        ) -> Result<ResolvedValue, ResolveError> {
            Err(ResolveError::IndexOutOfRange(index))
        }

        fn invoke(
            &self,
            _obj: &crate::resolver::ObjectHandle,
            method: &str,
            _args: &[ResolvedValue],
        ) -> Result<ResolvedValue, ResolveError> {
            Err(ResolveError::NoSuchMethod(method.to_string()))
        }

        fn set_property(
            &self,
            obj: &crate::resolver::ObjectHandle,
            name: &str,
            value: ResolvedValue,
        ) -> Result<(), ResolveError> {
            let fake = self
                .objects
                .get(&obj.object_id())
                .ok_or_else(|| ResolveError::NoSuchProperty(name.to_string()))?;
            fake.fields.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }

        fn standard_variable(&self, name: &str) -> Result<ResolvedValue, ResolveError> {
            Err(ResolveError::UnknownStandard(name.to_string()))
        }
    }

    fn make_resolver() -> FakeResolver {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), ResolvedValue::String("Ada".to_string()));
        let app = std::sync::Arc::new(FakeObject {
            id: 1,
            type_name: "App".to_string(),
            fields: RefCell::new(fields),
        });
        let mut objects = HashMap::new();
        objects.insert(1, app);
        FakeResolver { objects }
    }

    #[test]
    fn root_is_unique_and_has_id_one() {
        let mut tracker = ChangeTracker::new(WrapperRegistry::new());
        tracker.create_root(ResolvedValue::Null, BTreeMap::new()).unwrap();
        assert!(matches!(
            tracker.create_root(ResolvedValue::Null, BTreeMap::new()),
            Err(CoreError::RootAlreadyExists)
        ));
        assert_eq!(tracker.get(1).unwrap().parent_id, 0);
    }

    #[test]
    fn frontend_ids_must_be_positive_and_unique() {
        let mut tracker = ChangeTracker::new(WrapperRegistry::new());
        let resolver = make_resolver();
        tracker
            .create_root(
                ResolvedValue::Object(resolver.objects[&1].clone()),
                BTreeMap::new(),
            )
            .unwrap();
        assert!(matches!(
            tracker.create(1, Some("name"), BTreeMap::new(), Some(-5), &resolver),
            Err(CoreError::NonPositiveId(-5))
        ));
        let id = tracker
            .create(1, Some("name"), BTreeMap::new(), Some(7), &resolver)
            .unwrap();
        assert_eq!(id, 7);
        assert!(matches!(
            tracker.create(1, Some("name"), BTreeMap::new(), Some(7), &resolver),
            Err(CoreError::DuplicateId(7))
        ));
    }

    #[test]
    fn server_vended_ids_are_negative_and_disjoint() {
        let mut tracker = ChangeTracker::new(WrapperRegistry::new());
        let resolver = make_resolver();
        tracker
            .create_root(
                ResolvedValue::Object(resolver.objects[&1].clone()),
                BTreeMap::new(),
            )
            .unwrap();
        let a = tracker
            .create(1, Some("name"), BTreeMap::new(), None, &resolver)
            .unwrap();
        let b = tracker
            .create(1, Some("name"), BTreeMap::new(), None, &resolver)
            .unwrap();
        assert!(a < 0 && b < 0 && a != b);
    }

    #[test]
    fn watch_activates_and_unwatch_suspends() {
        let mut tracker = ChangeTracker::new(WrapperRegistry::new());
        let resolver = make_resolver();
        tracker
            .create_root(
                ResolvedValue::Object(resolver.objects[&1].clone()),
                BTreeMap::new(),
            )
            .unwrap();
        let id = tracker
            .create(1, Some("name"), BTreeMap::new(), None, &resolver)
            .unwrap();
        assert!(!tracker.get(id).unwrap().active);
        tracker.watch(id).unwrap();
        assert!(tracker.get(id).unwrap().active);
        tracker.unwatch(id).unwrap();
        assert!(!tracker.get(id).unwrap().active);
    }

    #[test]
    fn detect_changes_only_reports_active_variables_that_changed() {
        let mut tracker = ChangeTracker::new(WrapperRegistry::new());
        let resolver = make_resolver();
        tracker
            .create_root(
                ResolvedValue::Object(resolver.objects[&1].clone()),
                BTreeMap::new(),
            )
            .unwrap();
        let id = tracker
            .create(1, Some("name"), BTreeMap::new(), None, &resolver)
            .unwrap();
        tracker.watch(id).unwrap();
        assert!(tracker.detect_changes(&resolver).is_empty());

        resolver.objects[&1]
            .fields
            .borrow_mut()
            .insert("name".to_string(), ResolvedValue::String("Grace".to_string()));
        let changes = tracker.detect_changes(&resolver);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].id, id);
    }

    #[test]
    fn destroying_root_cascades_to_descendants() {
        let mut tracker = ChangeTracker::new(WrapperRegistry::new());
        let resolver = make_resolver();
        tracker
            .create_root(
                ResolvedValue::Object(resolver.objects[&1].clone()),
                BTreeMap::new(),
            )
            .unwrap();
        let child = tracker
            .create(1, Some("name"), BTreeMap::new(), None, &resolver)
            .unwrap();
        let removed = tracker.destroy(1);
        assert!(removed.contains(&1));
        assert!(removed.contains(&child));
        assert!(!tracker.exists(1));
        assert!(!tracker.exists(child));
    }

    #[test]
    fn change_all_forces_full_resend_once() {
        let mut tracker = ChangeTracker::new(WrapperRegistry::new());
        let resolver = make_resolver();
        let mut props = BTreeMap::new();
        props.insert("type".to_string(), "App".to_string());
        tracker
            .create_root(ResolvedValue::Object(resolver.objects[&1].clone()), props)
            .unwrap();
        tracker.change_all(1);
        let changes = tracker.detect_changes(&resolver);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].properties.get("type").map(String::as_str), Some("App"));

        let changes_again = tracker.detect_changes(&resolver);
        assert!(changes_again.is_empty());
    }
}
