//! Raw copy renderer for sources without a templating block.

use std::path::{Path, PathBuf};

use manifold_core::ApplicationNode;

use crate::dispatch::NodeRenderer;
use crate::error::{io_err, RenderError};

/// Copies `<workdir>/<source path>` into the node's output directory.
#[derive(Debug, Clone)]
pub struct CopySource {
    workdir: PathBuf,
}

impl CopySource {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        CopySource {
            workdir: workdir.into(),
        }
    }
}

impl NodeRenderer for CopySource {
    fn render(&self, node: &ApplicationNode, output: &Path) -> Result<(), RenderError> {
        std::fs::create_dir_all(output).map_err(|e| io_err(output, e))?;
        // No source path means nothing to copy; joining "" would copy the workdir.
        if node.source_path().is_empty() {
            return Ok(());
        }
        copy_tree(&self.workdir.join(node.source_path()), output)
    }
}

/// Recursively copy the contents of `src` into `dst`.
///
/// Symlinks are followed: the copy holds real files, so the output tree is
/// reviewable on its own.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<(), RenderError> {
    std::fs::create_dir_all(dst).map_err(|e| io_err(dst, e))?;
    let entries = std::fs::read_dir(src).map_err(|e| io_err(src, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let meta = std::fs::metadata(&from).map_err(|e| io_err(&from, e))?;
        if meta.is_dir() {
            copy_tree(&from, &to)?;
        } else {
            std::fs::copy(&from, &to).map_err(|e| io_err(&from, e))?;
        }
    }
    Ok(())
}
