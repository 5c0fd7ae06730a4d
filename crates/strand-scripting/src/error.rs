use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum HostError {
    #[error("no such prototype {0:?}")]
    UnknownPrototype(String),
    #[error("value is not a DynObject")]
    NotADynObject,
    #[error("no such property {0:?}")]
    NoSuchProperty(String),
    #[error("no such method {0:?}")]
    NoSuchMethod(String),
    #[error("method {0:?} threw: {1}")]
    MethodThrew(String, String),
}

impl From<HostError> for strand_core::ResolveError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::UnknownPrototype(_) | HostError::NotADynObject => {
                strand_core::ResolveError::NotAnObject
            }
            HostError::NoSuchProperty(name) => strand_core::ResolveError::NoSuchProperty(name),
            HostError::NoSuchMethod(name) => strand_core::ResolveError::NoSuchMethod(name),
            HostError::MethodThrew(name, msg) => strand_core::ResolveError::MethodThrew(name, msg),
        }
    }
}
