//! Render dispatch: picks a renderer per node and runs the post-render hook.
//!
//! Selection order:
//! 1. `helm` source → template renderer
//! 2. `kustomize` source → [`RenderOutcome::Unsupported`], output untouched
//! 3. anything else → raw copy of the source directory
//!
//! The output directory is removed before rendering: rendering is all or
//! nothing per node, never incremental at the file level.

use std::io::ErrorKind;
use std::path::Path;

use manifold_core::{ApplicationNode, SourceKind};

use crate::error::{io_err, RenderError};
use crate::hook::PostRenderHook;

/// Something that writes a node's output into a directory.
///
/// Implementations must be callable from several threads at once; each call
/// receives its own output directory.
pub trait NodeRenderer: Send + Sync {
    fn render(&self, node: &ApplicationNode, output: &Path) -> Result<(), RenderError>;
}

/// Result of a dispatch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Output was (re)written.
    Rendered,
    /// The node declares a source kind that is not rendered. Callers skip it.
    Unsupported,
}

/// Chooses between the template and copy renderers.
pub struct Dispatcher {
    template: Box<dyn NodeRenderer>,
    copy: Box<dyn NodeRenderer>,
    post_render: Option<PostRenderHook>,
}

impl Dispatcher {
    pub fn new(template: Box<dyn NodeRenderer>, copy: Box<dyn NodeRenderer>) -> Self {
        Dispatcher {
            template,
            copy,
            post_render: None,
        }
    }

    /// Run `hook` after every successful render.
    pub fn with_post_render(mut self, hook: PostRenderHook) -> Self {
        self.post_render = Some(hook);
        self
    }

    /// Render `node` into `output`.
    pub fn render(
        &self,
        node: &ApplicationNode,
        output: &Path,
    ) -> Result<RenderOutcome, RenderError> {
        let renderer = match node.source_kind() {
            SourceKind::Template => self.template.as_ref(),
            SourceKind::Unsupported => {
                tracing::warn!(node = node.name(), "kustomize sources are not supported; skipping");
                return Ok(RenderOutcome::Unsupported);
            }
            SourceKind::RawCopy => self.copy.as_ref(),
        };

        tracing::info!(node = node.name(), kind = %node.source_kind(), "render");
        clear_output(output)?;
        renderer.render(node, output)?;

        if let Some(hook) = &self.post_render {
            hook.run(output).map_err(|e| RenderError::PostRender {
                output: output.to_path_buf(),
                source: Box::new(e),
            })?;
        }

        Ok(RenderOutcome::Rendered)
    }
}

fn clear_output(output: &Path) -> Result<(), RenderError> {
    match std::fs::remove_dir_all(output) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(output, err)),
    }
}
