//! Package installation against the merged workspace manifest.

use std::path::Path;
use std::process::Command;

use log::info;

use crate::error::{Error, Result};
use crate::tools;

/// Installs dependencies from the manifest in a directory.
pub trait PackageInstaller: Send + Sync {
    /// Program the installer needs on `PATH`.
    fn program(&self) -> &str;

    /// Fail with `MissingDependency` when the program is unavailable.
    fn preflight(&self) -> Result<()> {
        tools::require(self.program())
    }

    fn install(&self, directory: &Path) -> Result<()>;
}

/// Runs `program args...` in the workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInstaller {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Default for CommandInstaller {
    /// `pnpm install`, which honours the `overrides` in `pnpm-workspace.yaml`.
    fn default() -> Self {
        Self::new("pnpm", vec!["install".to_string()])
    }
}

impl PackageInstaller for CommandInstaller {
    fn program(&self) -> &str {
        &self.program
    }

    fn install(&self, directory: &Path) -> Result<()> {
        let display = std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        info!("Installing dependencies: {} (in {})", display, directory.display());

        let mut command = Command::new(&self.program);
        command.args(&self.args).current_dir(directory);
        let output = tools::output(&mut command, &self.program, &display)?;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: display,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}
