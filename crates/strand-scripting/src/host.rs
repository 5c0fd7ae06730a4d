//! `ScriptingHost`: the interface the core consumes (spec §4.4), and
//! `DynHost`, the one concrete reference implementation this repo ships.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use strand_core::{ObjectHandle, ResolveError, Resolver, ResolvedValue};
use tracing::warn;

use crate::error::HostError;
use crate::object::DynObject;
use crate::prototype::Prototype;

/// Capabilities the core needs from a scripting backend: idempotent
/// prototype declaration with mutation-pass hot reload, instance creation,
/// and reflective access through `Resolver`. Implemented once by `DynHost`;
/// any real scripting language would implement it against its own runtime.
pub trait ScriptingHost: Resolver + Send + Sync {
    /// Declares or redeclares a prototype. Re-declaration with a changed
    /// field set nils removed fields on every live instance and runs
    /// `mutate()` on each (best-effort). A no-op redeclaration with an
    /// identical init does neither (spec §8 idempotence property).
    fn declare_prototype(&self, prototype: Prototype) -> MutationReport;

    /// Produces a tracked instance with `prototype` as its field template.
    fn create_instance(&self, prototype: &str) -> Result<ObjectHandle, HostError>;

    /// The object that becomes variable 1 for a fresh session.
    fn create_app_object(&self) -> ObjectHandle;

    /// Count of currently-live (non-GC'd) instances of `prototype`, for tests
    /// and the debug endpoint.
    fn live_instance_count(&self, prototype: &str) -> usize;
}

/// Outcome of a `declare_prototype` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationReport {
    pub was_mutation: bool,
    pub instances_mutated: usize,
    pub instances_failed: usize,
}

/// A small dynamic-object interpreter: prototypes hold native closures
/// registered in Rust, not a parser for any scripting syntax (spec §4.4:
/// "exists only so the rest of the system has something real to resolve
/// paths against").
#[derive(Default)]
pub struct DynHost {
    prototypes: DashMap<String, Prototype>,
    instances: DashMap<String, Vec<Weak<DynObject>>>,
    next_id: AtomicI64,
}

impl DynHost {
    pub fn new() -> Self {
        DynHost {
            prototypes: DashMap::new(),
            instances: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    fn downcast<'a>(&self, obj: &'a ObjectHandle) -> Result<&'a DynObject, HostError> {
        obj.as_any()
            .downcast_ref::<DynObject>()
            .ok_or(HostError::NotADynObject)
    }

    fn run_mutation_pass(&self, prototype: &Prototype) -> (usize, usize) {
        let Some(mut weak_list) = self.instances.get_mut(&prototype.name) else {
            return (0, 0);
        };
        weak_list.retain(|w| w.strong_count() > 0);

        let mut mutated = 0;
        let mut failed = 0;
        for weak in weak_list.iter() {
            let Some(obj) = weak.upgrade() else { continue };
            {
                let mut fields = obj.fields.write().unwrap();
                let stale: Vec<String> = fields
                    .keys()
                    .filter(|k| !prototype.fields.contains_key(*k))
                    .cloned()
                    .collect();
                for key in stale {
                    fields.insert(key, ResolvedValue::Null);
                }
            }
            if let Some(mutate) = &prototype.mutate {
                match mutate(&obj, &[]) {
                    Ok(_) => mutated += 1,
                    Err(err) => {
                        failed += 1;
                        warn!(
                            prototype = %prototype.name,
                            instance = obj.object_id_for_log(),
                            error = %err,
                            "mutate() failed during prototype hot-reload; isolated"
                        );
                    }
                }
            }
        }
        (mutated, failed)
    }
}

impl DynObject {
    fn object_id_for_log(&self) -> i64 {
        self.id
    }
}

impl ScriptingHost for DynHost {
    fn declare_prototype(&self, prototype: Prototype) -> MutationReport {
        let previous = self.prototypes.get(&prototype.name).map(|p| p.fields.clone());
        let is_redeclaration = previous.is_some();
        let unchanged = previous.as_ref() == Some(&prototype.fields);

        self.prototypes.insert(prototype.name.clone(), prototype.clone());

        if is_redeclaration && !unchanged {
            let (mutated, failed) = self.run_mutation_pass(&prototype);
            MutationReport {
                was_mutation: true,
                instances_mutated: mutated,
                instances_failed: failed,
            }
        } else {
            MutationReport::default()
        }
    }

    fn create_instance(&self, prototype: &str) -> Result<ObjectHandle, HostError> {
        let proto = self
            .prototypes
            .get(prototype)
            .ok_or_else(|| HostError::UnknownPrototype(prototype.to_string()))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let obj = Arc::new(DynObject {
            id,
            prototype: prototype.to_string(),
            fields: std::sync::RwLock::new(proto.fields.clone()),
        });
        self.instances
            .entry(prototype.to_string())
            .or_default()
            .push(Arc::downgrade(&obj));
        Ok(obj as ObjectHandle)
    }

    fn create_app_object(&self) -> ObjectHandle {
        if !self.prototypes.contains_key("App") {
            self.declare_prototype(Prototype::new("App"));
        }
        self.create_instance("App")
            .expect("App prototype just declared")
    }

    fn live_instance_count(&self, prototype: &str) -> usize {
        self.instances
            .get(prototype)
            .map(|list| list.iter().filter(|w| w.strong_count() > 0).count())
            .unwrap_or(0)
    }
}

impl Resolver for DynHost {
    fn get_property(&self, obj: &ObjectHandle, name: &str) -> Result<ResolvedValue, ResolveError> {
        let dyn_obj = self.downcast(obj).map_err(Into::into)?;
        dyn_obj
            .get_field(name)
            .ok_or_else(|| ResolveError::NoSuchProperty(name.to_string()))
    }

    fn get_index(&self, obj: &ObjectHandle, index: u64) -> Result<ResolvedValue, ResolveError> {
        let _ = self.downcast(obj).map_err(Into::into)?;
        Err(ResolveError::IndexOutOfRange(index))
    }

    fn invoke(
        &self,
        obj: &ObjectHandle,
        method: &str,
        args: &[ResolvedValue],
    ) -> Result<ResolvedValue, ResolveError> {
        let dyn_obj = self.downcast(obj).map_err(Into::into)?;
        let proto = self
            .prototypes
            .get(dyn_obj.prototype_name())
            .ok_or_else(|| ResolveError::NoSuchMethod(method.to_string()))?;
        let native = proto
            .methods
            .get(method)
            .ok_or_else(|| ResolveError::NoSuchMethod(method.to_string()))?;
        native(dyn_obj, args).map_err(|e| match e {
            HostError::MethodThrew(name, msg) => ResolveError::MethodThrew(name, msg),
            other => ResolveError::MethodThrew(method.to_string(), other.to_string()),
        })
    }

    fn set_property(
        &self,
        obj: &ObjectHandle,
        name: &str,
        value: ResolvedValue,
    ) -> Result<(), ResolveError> {
        let dyn_obj = self.downcast(obj).map_err(Into::into)?;
        dyn_obj.set_field(name, value);
        Ok(())
    }

    fn standard_variable(&self, name: &str) -> Result<ResolvedValue, ResolveError> {
        Err(ResolveError::UnknownStandard(name.to_string()))
    }
}
