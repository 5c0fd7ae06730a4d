//! `ViewList` / `ViewListItem`: the built-in array wrapper (spec §4.3).

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::json;

use crate::resolver::{ResolveError, ResolvedObject, ResolvedValue};
use crate::wrapper::{GraphHost, Wrapper, WrapperContext, WrapperError, WrapperFactory};

/// Presenter record for one element of a wrapped backing array. Lives as the
/// `value` of a server-vended child `Variable`; addressed on the wire by
/// that variable's id, per spec §3 ("no `baseItem` field, no manual JSON
/// parsing of item values").
#[derive(Debug, Clone)]
pub struct ViewListItemObject {
    pub id: i64,
    pub item: ResolvedValue,
    pub list_variable_id: i64,
    pub index: usize,
}

impl ViewListItemObject {
    pub fn get_property(&self, name: &str) -> Result<ResolvedValue, ResolveError> {
        match name {
            "item" => Ok(self.item.clone()),
            "index" => Ok(ResolvedValue::Number((self.index as u64).into())),
            // "list" is a structural back-reference; the frontend already
            // addresses the owning ViewList by its parent variable id, so
            // this textual property is a record-completeness stub only.
            "list" => Ok(ResolvedValue::Null),
            other => Err(ResolveError::NoSuchProperty(other.to_string())),
        }
    }
}

impl ResolvedObject for ViewListItemObject {
    fn object_id(&self) -> i64 {
        self.id
    }

    fn type_name(&self) -> String {
        "ViewListItem".to_string()
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// Downcasts a generic resolved object into a `ViewListItemObject`, used by
/// `ChangeTracker::resolve` to dispatch built-in properties before falling
/// back to the session's `Resolver`.
pub fn as_view_list_item(obj: &Arc<dyn ResolvedObject>) -> Option<ViewListItemObject> {
    obj.as_any().downcast_ref::<ViewListItemObject>().cloned()
}

/// Wraps a backend array as a parallel list of `ViewListItem` presenters,
/// synchronized via the three-phase shrink/grow/refresh algorithm (spec §4.3).
#[derive(Debug)]
pub struct ViewList {
    variable_id: i64,
    item_variable_ids: Vec<i64>,
    selection_index: i64,
    item_type: Option<String>,
    item_wrapper: Option<String>,
}

impl ViewList {
    fn item_properties(&self) -> BTreeMap<String, String> {
        let mut props = BTreeMap::new();
        if let Some(t) = &self.item_type {
            props.insert("type".to_string(), t.clone());
        }
        if let Some(w) = &self.item_wrapper {
            props.insert("wrapper".to_string(), w.clone());
        }
        props.insert("fallbackNamespace".to_string(), "list-item".to_string());
        props
    }

    fn push_item(&mut self, host: &mut dyn GraphHost, item: ResolvedValue, index: usize) {
        let props = self.item_properties();
        let id = host.create_child(self.variable_id, ResolvedValue::Null, props);
        host.set_child_value(
            id,
            ResolvedValue::Object(Arc::new(ViewListItemObject {
                id,
                item,
                list_variable_id: self.variable_id,
                index,
            })),
        );
        self.item_variable_ids.push(id);
    }

    fn refresh_item(&self, host: &mut dyn GraphHost, index: usize, item: ResolvedValue) {
        let id = self.item_variable_ids[index];
        host.set_child_value(
            id,
            ResolvedValue::Object(Arc::new(ViewListItemObject {
                id,
                item,
                list_variable_id: self.variable_id,
                index,
            })),
        );
    }

    pub fn selection_index(&self) -> i64 {
        self.selection_index
    }

    pub fn set_selection_index(&mut self, index: i64) {
        self.selection_index = index;
    }

    pub fn item_variable_ids(&self) -> &[i64] {
        &self.item_variable_ids
    }
}

impl Wrapper for ViewList {
    fn refresh(
        &mut self,
        host: &mut dyn GraphHost,
        value: &ResolvedValue,
    ) -> Result<(), WrapperError> {
        let items: Vec<ResolvedValue> = value.as_array().unwrap_or(&[]).to_vec();

        // 1. Shrink.
        while self.item_variable_ids.len() > items.len() {
            if let Some(id) = self.item_variable_ids.pop() {
                host.destroy_child(id);
            }
        }
        // 2. Grow.
        while self.item_variable_ids.len() < items.len() {
            let index = self.item_variable_ids.len();
            self.push_item(host, items[index].clone(), index);
        }
        // 3. Refresh — handles reorderings and reassignments.
        for (index, item) in items.into_iter().enumerate() {
            self.refresh_item(host, index, item);
        }
        Ok(())
    }

    fn wire_json(&self) -> serde_json::Value {
        serde_json::Value::Array(
            self.item_variable_ids
                .iter()
                .map(|id| json!({ "obj": id }))
                .collect(),
        )
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn destroy(&mut self, host: &mut dyn GraphHost) {
        for id in self.item_variable_ids.drain(..) {
            host.destroy_child(id);
        }
    }
}

/// Builds the `"ViewList"` factory entry for the process-wide `WrapperRegistry`.
pub fn view_list_factory() -> WrapperFactory {
    Arc::new(|ctx: &WrapperContext<'_>| -> Result<Box<dyn Wrapper>, WrapperError> {
        Ok(Box::new(ViewList {
            variable_id: ctx.variable_id,
            item_variable_ids: Vec::new(),
            selection_index: 0,
            item_type: ctx.properties.get("item").cloned(),
            item_wrapper: ctx.properties.get("itemWrapper").cloned(),
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeHost {
        next_id: i64,
        values: HashMap<i64, ResolvedValue>,
        destroyed: Vec<i64>,
    }

    impl GraphHost for FakeHost {
        fn create_child(
            &mut self,
            _parent_id: i64,
            value: ResolvedValue,
            _properties: BTreeMap<String, String>,
        ) -> i64 {
            self.next_id -= 1;
            self.values.insert(self.next_id, value);
            self.next_id
        }

        fn set_child_value(&mut self, id: i64, value: ResolvedValue) {
            self.values.insert(id, value);
        }

        fn destroy_child(&mut self, id: i64) {
            self.destroyed.push(id);
            self.values.remove(&id);
        }
    }

    fn num(n: i64) -> ResolvedValue {
        ResolvedValue::Number(n.into())
    }

    #[test]
    fn sync_grows_shrinks_and_refreshes() {
        let mut host = FakeHost::default();
        let mut list = ViewList {
            variable_id: 9,
            item_variable_ids: Vec::new(),
            selection_index: 0,
            item_type: None,
            item_wrapper: None,
        };

        list.refresh(&mut host, &ResolvedValue::Array(vec![num(1), num(2), num(3)]))
            .unwrap();
        assert_eq!(list.item_variable_ids.len(), 3);

        list.refresh(&mut host, &ResolvedValue::Array(vec![num(9), num(8)]))
            .unwrap();
        assert_eq!(list.item_variable_ids.len(), 2);
        assert_eq!(host.destroyed.len(), 1);
    }

    #[test]
    fn sync_is_idempotent_on_fixed_input() {
        let mut host = FakeHost::default();
        let mut list = ViewList {
            variable_id: 9,
            item_variable_ids: Vec::new(),
            selection_index: 0,
            item_type: None,
            item_wrapper: None,
        };
        let value = ResolvedValue::Array(vec![num(1), num(2)]);
        list.refresh(&mut host, &value).unwrap();
        let ids_first = list.item_variable_ids.clone();
        list.refresh(&mut host, &value).unwrap();
        assert_eq!(ids_first, list.item_variable_ids);
    }
}
