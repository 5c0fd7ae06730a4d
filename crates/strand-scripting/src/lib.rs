//! ScriptingHost interface and `DynHost`, the demo interpreter this repo
//! ships to drive prototypes, mutation passes, and method dispatch against a
//! real (if small) object model (spec §4.4).

pub mod demo;
pub mod error;
pub mod host;
pub mod object;
pub mod prototype;

pub use demo::install_contact_domain;
pub use error::HostError;
pub use host::{DynHost, MutationReport, ScriptingHost};
pub use object::DynObject;
pub use prototype::{NativeMethod, Prototype};

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::{ResolveError, Resolver, ResolvedValue};

    #[test]
    fn create_instance_uses_prototype_defaults() {
        let host = DynHost::new();
        host.declare_prototype(Prototype::new("Contact").with_field(
            "name",
            ResolvedValue::String("unnamed".to_string()),
        ));
        let obj = host.create_instance("Contact").unwrap();
        assert_eq!(
            host.get_property(&obj, "name").unwrap(),
            ResolvedValue::String("unnamed".to_string())
        );
    }

    #[test]
    fn unknown_prototype_errors() {
        let host = DynHost::new();
        assert!(matches!(
            host.create_instance("Ghost"),
            Err(HostError::UnknownPrototype(_))
        ));
    }

    #[test]
    fn redeclaration_with_identical_init_is_a_noop() {
        let host = DynHost::new();
        let proto = || Prototype::new("Contact").with_field("name", ResolvedValue::Null);
        let first = host.declare_prototype(proto());
        assert!(!first.was_mutation);
        let second = host.declare_prototype(proto());
        assert!(!second.was_mutation);
    }

    #[test]
    fn redeclaration_nils_removed_fields_and_runs_mutate() {
        let host = DynHost::new();
        host.declare_prototype(
            Prototype::new("Contact")
                .with_field("name", ResolvedValue::String("a".to_string()))
                .with_field("legacy", ResolvedValue::String("x".to_string())),
        );
        let obj = host.create_instance("Contact").unwrap();
        assert_eq!(
            host.get_property(&obj, "legacy").unwrap(),
            ResolvedValue::String("x".to_string())
        );

        let report = host.declare_prototype(
            Prototype::new("Contact").with_field("name", ResolvedValue::String("a".to_string())),
        );
        assert!(report.was_mutation);
        assert_eq!(report.instances_mutated, 1);
        assert_eq!(host.get_property(&obj, "legacy").unwrap(), ResolvedValue::Null);
    }

    #[test]
    fn invoke_dispatches_native_methods() {
        let host = DynHost::new();
        install_contact_domain(&host);
        let obj = host.create_instance("Contact").unwrap();
        host.set_property(&obj, "name", ResolvedValue::String("Ada".to_string()))
            .unwrap();
        let greeting = host.invoke(&obj, "greeting", &[]).unwrap();
        assert_eq!(greeting, ResolvedValue::String("Hello, Ada".to_string()));
    }

    #[test]
    fn invoke_unknown_method_errors() {
        let host = DynHost::new();
        host.declare_prototype(Prototype::new("Contact"));
        let obj = host.create_instance("Contact").unwrap();
        assert!(matches!(
            host.invoke(&obj, "nope", &[]),
            Err(ResolveError::NoSuchMethod(_))
        ));
    }
}
