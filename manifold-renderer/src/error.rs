//! Error types for manifold-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise while rendering a node.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Filesystem error while clearing, copying, or writing output.
    #[error("render io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external program could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The templating renderer exited non-zero.
    #[error("error templating manifest for {name} ({status}): {stderr}")]
    Template {
        name: String,
        status: String,
        stderr: String,
    },

    /// Chart dependency resolution failed.
    #[error("error updating dependencies for {chart}: {stderr}")]
    DependencyUpdate { chart: PathBuf, stderr: String },

    /// The post-render command exited non-zero.
    #[error("{command} exited with {status}")]
    HookFailed { command: PathBuf, status: String },

    /// Wraps any failure of the post-render step. The primary render output
    /// is left in place.
    #[error("post render failed for {output}: {source}")]
    PostRender {
        output: PathBuf,
        #[source]
        source: Box<RenderError>,
    },
}

/// Convenience constructor for [`RenderError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}
