//! # CLI Command Implementations
//!
//! Each subcommand lives in its own file with an `Args` struct derived with
//! `clap` and an `execute` function that calls into the `polyrepo` library.
//!
//! The commands that work on a workspace share [`WorkspaceArgs`], which layers
//! command-line flags over the optional `.polyrepo.yaml`.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use polyrepo::config::{self, Config};
use polyrepo::workspace::Patterns;

pub mod completions;
pub mod init;
pub mod ls;
pub mod run;

/// Workspace root used when neither `--root` nor the file names one.
pub const DEFAULT_ROOT: &str = "workspace";

/// Options selecting and locating a workspace.
#[derive(Args, Debug, Clone, Default)]
pub struct WorkspaceArgs {
    /// Path to the workspace configuration file.
    ///
    /// Defaults to `.polyrepo.yaml` in the current directory, if present.
    #[arg(short, long, value_name = "FILE", env = "POLYREPO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Access token for the hosting API.
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Directory the repositories are cloned into.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Repository pattern to include (repeatable). Replaces the file's list.
    #[arg(short, long = "include", value_name = "PATTERN")]
    pub include: Vec<String>,

    /// Full repository name to exclude (repeatable). Added to the file's list.
    #[arg(short = 'x', long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,
}

/// Everything a command needs after flags and file are combined.
#[derive(Debug, Clone)]
pub struct Settings {
    pub config: Config,
    pub root: PathBuf,
    pub token: String,
    pub patterns: Patterns,
}

impl WorkspaceArgs {
    /// Load the configuration relative to the current directory.
    pub fn load(&self) -> Result<Settings> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        self.load_from(&cwd)
    }

    /// Load the configuration relative to `cwd`. A relative `root` in the file
    /// is taken relative to the file's directory.
    pub fn load_from(&self, cwd: &Path) -> Result<Settings> {
        let (config, base) = match self.config.clone().or_else(|| config::discover(cwd)) {
            Some(path) => {
                let path = cwd.join(path);
                if !path.is_file() {
                    bail!("Configuration file not found: {}", path.display());
                }
                let config = config::from_file(&path).with_context(|| {
                    format!("Failed to load config from {}", path.display())
                })?;
                let base = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.to_path_buf());
                (config, base)
            }
            None => (Config::default(), cwd.to_path_buf()),
        };

        let root = match (&self.root, &config.root) {
            (Some(root), _) => cwd.join(root),
            (None, Some(root)) => base.join(root),
            (None, None) => base.join(DEFAULT_ROOT),
        };

        let include = if self.include.is_empty() {
            config.include.clone()
        } else {
            self.include.clone()
        };
        if include.is_empty() {
            bail!(
                "No repositories to include\n  hint: pass --include OWNER/NAME or list patterns under `include:` in {}",
                config::CONFIG_FILE
            );
        }
        let exclude = config
            .exclude
            .iter()
            .chain(&self.exclude)
            .cloned()
            .collect::<Vec<_>>();

        Ok(Settings {
            token: self.token.clone().unwrap_or_default(),
            patterns: Patterns { include, exclude },
            root,
            config,
        })
    }
}
