//! `Prototype`: a tagged-variant object template with default fields, native
//! methods, and an optional hot-reload `mutate` hook (spec §4.4, §9).

use std::collections::BTreeMap;
use std::sync::Arc;

use strand_core::ResolvedValue;

use crate::error::HostError;
use crate::object::DynObject;

pub type NativeMethod =
    Arc<dyn Fn(&DynObject, &[ResolvedValue]) -> Result<ResolvedValue, HostError> + Send + Sync>;

#[derive(Clone)]
pub struct Prototype {
    pub name: String,
    pub fields: BTreeMap<String, ResolvedValue>,
    pub methods: BTreeMap<String, NativeMethod>,
    pub mutate: Option<NativeMethod>,
}

impl std::fmt::Debug for Prototype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prototype")
            .field("name", &self.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("has_mutate", &self.mutate.is_some())
            .finish()
    }
}

impl Prototype {
    pub fn new(name: impl Into<String>) -> Self {
        Prototype {
            name: name.into(),
            fields: BTreeMap::new(),
            methods: BTreeMap::new(),
            mutate: None,
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, default: ResolvedValue) -> Self {
        self.fields.insert(name.into(), default);
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, method: NativeMethod) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn with_mutate(mut self, mutate: NativeMethod) -> Self {
        self.mutate = Some(mutate);
        self
    }
}
