//! A small `Contact`/`ContactList` domain used to exercise prototypes,
//! mutation passes, and method calls end-to-end (spec §4.4, §8 scenarios).
//! This is demo content, not part of the core's contract.

use std::sync::Arc;

use strand_core::ResolvedValue;

use crate::host::ScriptingHost;
use crate::prototype::Prototype;

pub fn install_contact_domain(host: &dyn ScriptingHost) {
    host.declare_prototype(
        Prototype::new("Contact")
            .with_field("name", ResolvedValue::String(String::new()))
            .with_field("email", ResolvedValue::String(String::new()))
            .with_method(
                "greeting",
                Arc::new(|obj, _args| {
                    let name = obj
                        .get_field("name")
                        .and_then(|v| match v {
                            ResolvedValue::String(s) => Some(s),
                            _ => None,
                        })
                        .unwrap_or_default();
                    Ok(ResolvedValue::String(format!("Hello, {name}")))
                }),
            ),
    );

    host.declare_prototype(
        Prototype::new("App")
            .with_field("selectedContact", ResolvedValue::Null)
            .with_field("contacts", ResolvedValue::Array(Vec::new()))
            .with_method(
                "addContact",
                Arc::new(|_obj, _args| Ok(ResolvedValue::Null)),
            ),
    );
}
