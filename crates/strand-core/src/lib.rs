//! Session graph core: path syntax, the change tracker, the wrapper
//! registry, and the built-in `ViewList` wrapper (spec §4.1-§4.3).

pub mod path;
pub mod resolver;
pub mod tracker;
pub mod variable;
pub mod viewlist;
pub mod wrapper;

pub use path::{Path, PathError, Segment};
pub use resolver::{ObjectHandle, ResolveError, ResolvedObject, ResolvedValue, Resolver};
pub use tracker::{ChangeTracker, CoreError, DetectedChange};
pub use variable::{Variable, VariableDiagnostics, VariableId};
pub use viewlist::{ViewList, ViewListItemObject, view_list_factory};
pub use wrapper::{GraphHost, Wrapper, WrapperContext, WrapperError, WrapperFactory, WrapperRegistry};
