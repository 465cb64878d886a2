//! Post-render hook: an external command run after each successful render.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::RenderError;

/// Runs `<command> <output dir>`; stderr is passed through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRenderHook {
    command: PathBuf,
    workdir: Option<PathBuf>,
}

impl PostRenderHook {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        PostRenderHook {
            command: command.into(),
            workdir: None,
        }
    }

    /// Run the hook from `workdir` instead of the process working directory.
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    /// Invoke the hook with `output` as its only argument.
    pub fn run(&self, output: &Path) -> Result<(), RenderError> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(output).stdin(Stdio::null()).stderr(Stdio::inherit());
        if let Some(dir) = &self.workdir {
            cmd.current_dir(dir);
        }
        let status = cmd.status().map_err(|e| RenderError::Spawn {
            program: self.command.display().to_string(),
            source: e,
        })?;
        if !status.success() {
            return Err(RenderError::HookFailed {
                command: self.command.clone(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}
