//! Wrapper factories: process-wide, name-keyed producers of stand-in values
//! (spec §4.3, §9 "global wrapper registry").
//!
//! Factories capture no session state; every bit of context they need comes
//! through the `WrapperContext` argument, which is how this module avoids a
//! dependency on `ChangeTracker` (wrappers create/destroy sibling variables
//! through the injected `GraphHost`, not through a concrete tracker type).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::resolver::ResolvedValue;

#[derive(Debug, Error)]
pub enum WrapperError {
    #[error("no wrapper factory registered for {0:?}")]
    UnknownFactory(String),
    #[error("wrapper factory {0:?} failed: {1}")]
    FactoryFailed(String, String),
}

/// Host operations a wrapper needs in order to manage variables of its own
/// (ViewList creates one child `Variable` per `ViewListItem`).
pub trait GraphHost {
    /// Create a server-vended child variable holding `value` directly (no
    /// path — the wrapper is the source of truth for it) and return its id.
    fn create_child(
        &mut self,
        parent_id: i64,
        value: ResolvedValue,
        properties: BTreeMap<String, String>,
    ) -> i64;
    /// Overwrite a previously created child's value in place.
    fn set_child_value(&mut self, id: i64, value: ResolvedValue);
    /// Destroy a previously created child (and its descendants).
    fn destroy_child(&mut self, id: i64);
}

/// Read-only view of the variable a wrapper is being attached to/refreshed for.
pub struct WrapperContext<'a> {
    pub variable_id: i64,
    pub properties: &'a BTreeMap<String, String>,
}

/// A stand-in value that replaces a variable's outgoing wire value.
///
/// `Send` because the session task that owns the `ChangeTracker` (and hence
/// every `Box<dyn Wrapper>` inside it) must itself be `Send` to run as a
/// tokio task; wrappers are never shared across sessions so `Sync` is not
/// required.
pub trait Wrapper: fmt::Debug + Send {
    /// Re-derive the wrapper's internal state from the variable's freshly
    /// resolved value. Called once at creation and again on every detected
    /// change to the underlying variable.
    fn refresh(
        &mut self,
        host: &mut dyn GraphHost,
        value: &ResolvedValue,
    ) -> Result<(), WrapperError>;

    /// The JSON that replaces `valueJSON` on the wire (spec invariant 4).
    fn wire_json(&self) -> serde_json::Value;

    fn as_any(&self) -> &dyn std::any::Any;

    /// Optional teardown hook, checked by capability detection at variable
    /// destruction (spec §4.3).
    fn destroy(&mut self, _host: &mut dyn GraphHost) {}
}

pub type WrapperFactory =
    Arc<dyn Fn(&WrapperContext<'_>) -> Result<Box<dyn Wrapper>, WrapperError> + Send + Sync>;

/// Process-wide, read-mostly name -> factory map (spec §5 "Shared resources").
#[derive(Clone, Default)]
pub struct WrapperRegistry {
    factories: Arc<DashMap<String, WrapperFactory>>,
}

impl WrapperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, factory: WrapperFactory) {
        self.factories.insert(name.into(), factory);
    }

    pub fn create(
        &self,
        name: &str,
        ctx: &WrapperContext<'_>,
    ) -> Result<Box<dyn Wrapper>, WrapperError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| WrapperError::UnknownFactory(name.to_string()))?;
        factory(ctx)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}
