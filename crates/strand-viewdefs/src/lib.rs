//! Viewdef storage, namespace resolution, and filesystem hot-reload.
//!
//! A viewdef is an HTML template keyed by `(type, namespace)`. This crate
//! owns the on-disk loading and the `notify`-backed watcher; delivering a
//! viewdef's HTML into a session's wire payload is `strand_server`'s job.

pub mod error;
pub mod hotloader;
pub mod namespace;
pub mod store;

pub use error::ViewdefError;
pub use hotloader::HotLoader;
pub use namespace::{parse_filename, resolve_namespace, viewdef_key};
pub use store::{DeliveryTracker, ViewdefStore};
