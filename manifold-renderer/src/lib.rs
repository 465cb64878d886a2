//! # manifold-renderer
//!
//! Turns one application node into files under its output directory.
//!
//! [`Dispatcher`] picks the render path from the node's [`SourceKind`]:
//! the external `helm` renderer ([`HelmTemplate`]), a raw copy of the source
//! tree ([`CopySource`]), or a skip for unsupported sources. An optional
//! [`PostRenderHook`] runs after every successful render.
//!
//! [`SourceKind`]: manifold_core::SourceKind

pub mod copy;
pub mod dispatch;
pub mod error;
pub mod helm;
pub mod hook;

pub use copy::CopySource;
pub use dispatch::{Dispatcher, NodeRenderer, RenderOutcome};
pub use error::RenderError;
pub use helm::{HelmTemplate, MANIFEST_FILE};
pub use hook::PostRenderHook;
