//! Phase 2: Directory Preparation
//!
//! Runs to completion before any synchronization starts. A `fresh` run wipes
//! the workspace root; otherwise only repository directories that exist but
//! are not working copies of the expected clone URL are removed, so that the
//! sync phase can clone into them.

use std::fs;
use std::path::Path;

use log::{debug, warn};

use super::{FailureStage, InitFailure, WorkspaceRepo};
use crate::error::Result;
use crate::git::DEFAULT_REMOTE;

/// Prepare `root` and the repository directories beneath it.
///
/// Failing to create or wipe the root is fatal. Failing to clear one stale
/// directory only takes that repository out of the run.
pub fn execute(
    root: &Path,
    repos: Vec<WorkspaceRepo>,
    fresh: bool,
) -> Result<(Vec<WorkspaceRepo>, Vec<InitFailure>)> {
    if fresh && root.exists() {
        warn!("Removing workspace root {} (fresh init)", root.display());
        fs::remove_dir_all(root)?;
    }
    fs::create_dir_all(root)?;

    let mut ready = Vec::with_capacity(repos.len());
    let mut failures = Vec::new();

    for repo in repos {
        match clear_stale(&repo) {
            Ok(()) => ready.push(repo),
            Err(error) => failures.push(InitFailure {
                full_name: repo.repository.full_name().to_string(),
                stage: FailureStage::Sync,
                error,
            }),
        }
    }

    Ok((ready, failures))
}

/// Remove `repo.directory` if something is there but it is not a checkout of
/// this repository's clone URL.
fn clear_stale(repo: &WorkspaceRepo) -> Result<()> {
    let path = &repo.directory;
    if !path.exists() {
        return Ok(());
    }

    let reason = if !repo.session.is_initialized() {
        "not a git working copy".to_string()
    } else {
        match repo.session.remote_url(DEFAULT_REMOTE) {
            Some(url) if same_remote(&url, repo.repository.clone_url()) => {
                debug!("{} is already a working copy", path.display());
                return Ok(());
            }
            Some(url) => format!("working copy of {}", url),
            None => format!("working copy without an '{}' remote", DEFAULT_REMOTE),
        }
    };

    warn!(
        "Removing {} before cloning {}: {}",
        path.display(),
        repo.repository.full_name(),
        reason
    );
    if path.is_dir() {
        fs::remove_dir_all(path)?;
    } else {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// Compare remote URLs ignoring case, a trailing slash and a `.git` suffix.
/// Local paths also match when they name the same directory.
fn same_remote(recorded: &str, expected: &str) -> bool {
    fn normalize(url: &str) -> String {
        let url = url.trim_end_matches('/');
        url.strip_suffix(".git").unwrap_or(url).to_lowercase()
    }

    if normalize(recorded) == normalize(expected) {
        return true;
    }
    match (fs::canonicalize(recorded), fs::canonicalize(expected)) {
        (Ok(recorded), Ok(expected)) => recorded == expected,
        _ => false,
    }
}
