//! manifold core library: application definitions and the document reader.
//!
//! Public API surface:
//! - [`types`]: [`ApplicationNode`] and its source model
//! - [`error`]: [`DocumentError`]
//! - [`document`]: multi-document YAML/JSON reader

pub mod document;
pub mod error;
pub mod types;

pub use error::DocumentError;
pub use types::{
    is_ignored_value_file, ApplicationNode, ApplicationSource, ApplicationSpec, Destination,
    HelmParameter, HelmSource, ObjectMeta, SourceKind, APPLICATION_KIND,
};
