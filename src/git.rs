//! Version-control operations scoped to one working directory.
//!
//! Every operation shells out to the system `git`, which picks up SSH keys,
//! credential helpers and anything else configured in `~/.gitconfig`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::error::{Error, Result};
use crate::tools;

/// Name of the remote every clone gets.
pub const DEFAULT_REMOTE: &str = "origin";

/// A session on one local directory. The path is the only state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitSession {
    directory: PathBuf,
}

impl GitSession {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// True iff the directory exists and holds a usable git repository of its
    /// own (not merely a folder nested inside some other checkout).
    pub fn is_initialized(&self) -> bool {
        if !self.directory.join(".git").exists() {
            return false;
        }
        let Ok(toplevel) = self.git(&["rev-parse", "--show-toplevel"]) else {
            return false;
        };
        match (fs::canonicalize(&toplevel), fs::canonicalize(&self.directory)) {
            (Ok(toplevel), Ok(directory)) => toplevel == directory,
            _ => false,
        }
    }

    /// Clone `url` into the session directory.
    pub fn clone_from(&self, url: &str) -> Result<()> {
        if let Some(parent) = self.directory.parent() {
            fs::create_dir_all(parent)?;
        }
        let target = self.directory.to_string_lossy().into_owned();
        run_git(None, &["clone", "--quiet", url, &target])?;
        Ok(())
    }

    /// Fetch one remote, or every remote when `remote` is `None`.
    pub fn fetch(&self, remote: Option<&str>) -> Result<()> {
        match remote {
            Some(remote) => self.git(&["fetch", "--quiet", "--prune", remote])?,
            None => self.git(&["fetch", "--quiet", "--prune", "--all"])?,
        };
        Ok(())
    }

    /// Discard uncommitted changes and untracked files.
    pub fn reset_hard(&self) -> Result<()> {
        self.git(&["reset", "--quiet", "--hard"])?;
        self.git(&["clean", "--quiet", "-fd"])?;
        Ok(())
    }

    /// Check out `r#ref`.
    ///
    /// A local branch, or a branch that so far only exists on
    /// [`DEFAULT_REMOTE`], is checked out as a branch. Anything else must
    /// resolve to a commit (a tag or a SHA) and leaves `HEAD` detached there.
    /// A ref that resolves to nothing is [`Error::RefNotFound`], never a path.
    pub fn checkout(&self, r#ref: &str) -> Result<()> {
        if r#ref.is_empty() || r#ref.starts_with('-') {
            return Err(self.ref_not_found(r#ref));
        }

        if self.has_ref(&format!("refs/heads/{}", r#ref)) {
            self.git(&["switch", "--quiet", r#ref])?;
        } else if self.has_remote_branch(DEFAULT_REMOTE, r#ref) {
            let tracking = format!("{}/{}", DEFAULT_REMOTE, r#ref);
            self.git(&["switch", "--quiet", "--create", r#ref, "--track", &tracking])?;
        } else {
            let commit = self
                .git(&["rev-parse", "--verify", "--quiet", &format!("{}^{{commit}}", r#ref)])
                .map_err(|_| self.ref_not_found(r#ref))?;
            self.git(&["switch", "--quiet", "--detach", &commit])?;
        }
        Ok(())
    }

    /// Fetch URL of `remote`, or `None` if the remote is not configured.
    pub fn remote_url(&self, remote: &str) -> Option<String> {
        self.git(&["remote", "get-url", remote]).ok()
    }

    /// Full SHA of `HEAD`.
    pub fn head_revision(&self) -> Result<String> {
        self.git(&["rev-parse", "HEAD"])
    }

    /// Checked-out branch, or `None` for a detached `HEAD`.
    pub fn current_branch(&self) -> Result<Option<String>> {
        let branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        Ok((branch != "HEAD").then_some(branch))
    }

    /// True if `remote/branch` exists locally after the last fetch.
    pub fn has_remote_branch(&self, remote: &str, branch: &str) -> bool {
        self.has_ref(&format!("refs/remotes/{}/{}", remote, branch))
    }

    /// Move the checked-out branch to the fetched `remote/branch`.
    pub fn fast_forward(&self, remote: &str, branch: &str) -> Result<()> {
        let tracking = format!("{}/{}", remote, branch);
        self.git(&["reset", "--quiet", "--hard", &tracking])?;
        Ok(())
    }

    /// True if the working tree has staged, unstaged or untracked changes.
    pub fn has_changes(&self) -> Result<bool> {
        Ok(!self.git(&["status", "--porcelain"])?.is_empty())
    }

    pub fn stage_all(&self) -> Result<()> {
        self.git(&["add", "--all"])?;
        Ok(())
    }

    pub fn commit(&self, message: &str) -> Result<()> {
        self.git(&["commit", "--quiet", "-m", message])?;
        Ok(())
    }

    pub fn push(&self, remote: &str, branch: &str) -> Result<()> {
        self.git(&["push", "--quiet", remote, branch])?;
        Ok(())
    }

    fn has_ref(&self, full_ref: &str) -> bool {
        self.git(&["rev-parse", "--verify", "--quiet", full_ref]).is_ok()
    }

    fn ref_not_found(&self, r#ref: &str) -> Error {
        Error::RefNotFound {
            reference: r#ref.to_string(),
            directory: self.directory.display().to_string(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        run_git(Some(&self.directory), args)
    }
}

/// Run `git` with `args`, returning trimmed stdout.
fn run_git(directory: Option<&Path>, args: &[&str]) -> Result<String> {
    let display = format!("git {}", args.join(" "));
    debug!(
        "{}{}",
        display,
        directory
            .map(|d| format!(" (in {})", d.display()))
            .unwrap_or_default()
    );

    let mut command = Command::new("git");
    command.args(args);
    if let Some(directory) = directory {
        command.current_dir(directory);
    }
    // Never block on a credential prompt.
    command.env("GIT_TERMINAL_PROMPT", "0");

    let output = tools::output(&mut command, "git", &display)?;
    if !output.status.success() {
        return Err(Error::CommandFailed {
            command: display,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
