//! `DynObject`: the instance type `DynHost` hands out as `ResolvedObject`s.

use std::collections::BTreeMap;
use std::sync::RwLock;

use strand_core::{ResolvedObject, ResolvedValue};

#[derive(Debug)]
pub struct DynObject {
    pub(crate) id: i64,
    pub(crate) prototype: String,
    pub(crate) fields: RwLock<BTreeMap<String, ResolvedValue>>,
}

impl DynObject {
    pub fn get_field(&self, name: &str) -> Option<ResolvedValue> {
        self.fields.read().unwrap().get(name).cloned()
    }

    pub fn set_field(&self, name: &str, value: ResolvedValue) {
        self.fields.write().unwrap().insert(name.to_string(), value);
    }

    pub fn prototype_name(&self) -> &str {
        &self.prototype
    }
}

impl ResolvedObject for DynObject {
    fn object_id(&self) -> i64 {
        self.id
    }

    fn type_name(&self) -> String {
        self.prototype.clone()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
