//! The `Resolver` capability: the seam between the session graph and
//! whatever scripting host owns the actual domain objects.
//!
//! Path resolution never touches a concrete interpreter type directly — it
//! goes through this trait, so `strand-core` stays ignorant of `strand-scripting`.

use std::fmt;
use std::sync::Arc;

use serde_json::Number;
use thiserror::Error;

/// An opaque backend object handle. Implemented by whatever the scripting
/// host uses to represent its domain instances.
pub trait ResolvedObject: fmt::Debug + Send + Sync {
    /// Stable id used both for `{"obj": id}` wire references and identity
    /// comparisons (spec §3 invariant 4 equality rule: "identity for objects").
    fn object_id(&self) -> i64;
    /// Type name used to select a viewdef family and reported in the debug dump.
    fn type_name(&self) -> String;
    /// Lets built-in strand-core object kinds (e.g. `ViewListItemObject`) be
    /// downcast out of the trait object without a dependency on `dyn Any`
    /// trait-upcasting coercion.
    fn as_any(&self) -> &dyn std::any::Any;
}

pub type ObjectHandle = Arc<dyn ResolvedObject>;

/// The value produced by resolving one path against its parent context.
#[derive(Debug, Clone)]
pub enum ResolvedValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<ResolvedValue>),
    Object(ObjectHandle),
}

impl ResolvedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ResolvedValue::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match self {
            ResolvedValue::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ResolvedValue]> {
        match self {
            ResolvedValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// `{"obj": id}` for objects, inline otherwise — per invariant 4, object
    /// values are never inlined on the wire.
    pub fn to_wire_json(&self) -> serde_json::Value {
        match self {
            ResolvedValue::Null => serde_json::Value::Null,
            ResolvedValue::Bool(b) => serde_json::Value::Bool(*b),
            ResolvedValue::Number(n) => serde_json::Value::Number(n.clone()),
            ResolvedValue::String(s) => serde_json::Value::String(s.clone()),
            ResolvedValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(ResolvedValue::to_wire_json).collect())
            }
            ResolvedValue::Object(obj) => {
                serde_json::json!({ "obj": obj.object_id() })
            }
        }
    }
}

/// Equality rule from spec §3 invariant 4 / §4.2 step 2: identity for
/// objects, deep equality for arrays, value equality for primitives.
impl PartialEq for ResolvedValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ResolvedValue::Null, ResolvedValue::Null) => true,
            (ResolvedValue::Bool(a), ResolvedValue::Bool(b)) => a == b,
            (ResolvedValue::Number(a), ResolvedValue::Number(b)) => a == b,
            (ResolvedValue::String(a), ResolvedValue::String(b)) => a == b,
            (ResolvedValue::Array(a), ResolvedValue::Array(b)) => a == b,
            (ResolvedValue::Object(a), ResolvedValue::Object(b)) => a.object_id() == b.object_id(),
            _ => false,
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum ResolveError {
    #[error("no such property {0:?}")]
    NoSuchProperty(String),
    #[error("index {0} out of range")]
    IndexOutOfRange(u64),
    #[error("value is not indexable")]
    NotIndexable,
    #[error("value is not an object")]
    NotAnObject,
    #[error("no such method {0:?}")]
    NoSuchMethod(String),
    #[error("method {0:?} threw: {1}")]
    MethodThrew(String, String),
    #[error("unknown standard variable {0:?}")]
    UnknownStandard(String),
    #[error("variable has no parent")]
    NoParent,
    #[error("path is not writable")]
    NotWritable,
}

/// Reflective access into the scripting host's object model. One instance
/// per session, handed to the `ChangeTracker` on every resolve/write.
pub trait Resolver {
    fn get_property(&self, obj: &ObjectHandle, name: &str) -> Result<ResolvedValue, ResolveError>;
    fn get_index(&self, obj: &ObjectHandle, index: u64) -> Result<ResolvedValue, ResolveError>;
    fn invoke(
        &self,
        obj: &ObjectHandle,
        method: &str,
        args: &[ResolvedValue],
    ) -> Result<ResolvedValue, ResolveError>;
    fn set_property(
        &self,
        obj: &ObjectHandle,
        name: &str,
        value: ResolvedValue,
    ) -> Result<(), ResolveError>;
    /// `@name` segments — only valid as the first segment of a path.
    fn standard_variable(&self, name: &str) -> Result<ResolvedValue, ResolveError>;
}
